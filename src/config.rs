//! Print job configuration and its per-command projections.
//!
//! [`PrintConfig`] is an immutable value object built with consuming
//! setters. Each protocol-setting command consumes a fixed subset of the
//! config, so the config projects into one narrow parameter struct per
//! command ([`ModeFlags`], [`ExpandedMode`], [`FeedMargin`]); a command
//! never sees fields it does not use. Each projection knows its own wire
//! encoding.

/// Optional protocol toggles for a print job.
///
/// Any combination of fields is accepted; the device itself rejects
/// combinations it cannot honor via the status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintConfig {
    mirror_printing: bool,
    auto_tape_cut: bool,
    half_cut: bool,
    chain_print: bool,
    label_end_cut: bool,
    high_resolution: bool,
    clear_buffer: bool,
    margin: u16,
}

impl Default for PrintConfig {
    fn default() -> Self {
        PrintConfig {
            mirror_printing: false,
            auto_tape_cut: false,
            half_cut: false,
            chain_print: false,
            label_end_cut: false,
            high_resolution: false,
            clear_buffer: true,
            margin: 0,
        }
    }
}

impl PrintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror_printing(self, flag: bool) -> Self {
        PrintConfig {
            mirror_printing: flag,
            ..self
        }
    }

    pub fn auto_tape_cut(self, flag: bool) -> Self {
        PrintConfig {
            auto_tape_cut: flag,
            ..self
        }
    }

    /// Only effective with laminated tape.
    pub fn half_cut(self, flag: bool) -> Self {
        PrintConfig {
            half_cut: flag,
            ..self
        }
    }

    /// When printing multiple copies, skip feeding and cutting after the
    /// last label.
    pub fn chain_print(self, flag: bool) -> Self {
        PrintConfig {
            chain_print: flag,
            ..self
        }
    }

    /// When printing multiple copies, cut the end of the last label.
    pub fn label_end_cut(self, flag: bool) -> Self {
        PrintConfig {
            label_end_cut: flag,
            ..self
        }
    }

    /// High-resolution printing (360 x 720 dpi instead of 360 x 360).
    pub fn high_resolution(self, flag: bool) -> Self {
        PrintConfig {
            high_resolution: flag,
            ..self
        }
    }

    /// Keep the expansion buffer between copies instead of clearing it.
    ///
    /// The printer only honors this for very small labels, and only from
    /// the second copy on.
    pub fn keep_buffer(self) -> Self {
        PrintConfig {
            clear_buffer: false,
            ..self
        }
    }

    /// Feed amount in dots.
    pub fn set_margin(self, margin: u16) -> Self {
        PrintConfig { margin, ..self }
    }

    /// Fields consumed by the "set mode flags" command (`ESC i M`).
    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            mirror_printing: self.mirror_printing,
            auto_tape_cut: self.auto_tape_cut,
        }
    }

    /// Fields consumed by the "set expanded mode" command (`ESC i K`).
    pub fn expanded_mode(&self) -> ExpandedMode {
        ExpandedMode {
            half_cut: self.half_cut,
            chain_print: self.chain_print,
            label_end_cut: self.label_end_cut,
            high_resolution: self.high_resolution,
            clear_buffer: self.clear_buffer,
        }
    }

    /// Fields consumed by the "set margin" command (`ESC i d`).
    pub fn feed_margin(&self) -> FeedMargin {
        FeedMargin {
            margin: self.margin,
        }
    }
}

/// Parameters of the mode-flags command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags {
    pub mirror_printing: bool,
    pub auto_tape_cut: bool,
}

impl ModeFlags {
    pub fn bits(&self) -> u8 {
        let mut mode = 0;
        if self.mirror_printing {
            mode |= 1 << 7;
        }
        if self.auto_tape_cut {
            mode |= 1 << 6;
        }
        mode
    }
}

/// Parameters of the expanded-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedMode {
    pub half_cut: bool,
    pub chain_print: bool,
    pub label_end_cut: bool,
    pub high_resolution: bool,
    pub clear_buffer: bool,
}

impl ExpandedMode {
    pub fn bits(&self) -> u8 {
        let mut mode = 0;
        // Bit 2: half cut, laminated tape only.
        if self.half_cut {
            mode |= 1 << 2;
        }
        // Bit 3: *no* chain printing; set means feed and cut the last label.
        if !self.chain_print {
            mode |= 1 << 3;
        }
        // Bit 5: cut the end of the last label.
        if self.label_end_cut {
            mode |= 1 << 5;
        }
        // Bit 6: high-resolution printing.
        if self.high_resolution {
            mode |= 1 << 6;
        }
        // Bit 7: *no* buffer clearing when printing.
        if !self.clear_buffer {
            mode |= 1 << 7;
        }
        mode
    }
}

/// Parameters of the margin (feed amount) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedMargin {
    pub margin: u16,
}

impl FeedMargin {
    pub fn bytes(&self) -> [u8; 2] {
        self.margin.to_le_bytes()
    }
}

/// Media and quality parameters of the `ESC i z` command.
///
/// Separate from [`PrintConfig`] because it describes the installed tape
/// rather than optional job toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    /// High print quality (false selects fast printing).
    pub high_quality: bool,
    /// Continuous roll rather than pre-cut labels.
    pub continuous: bool,
    /// Tape width in mm.
    pub width: u8,
    /// Label length in mm; forced to zero for continuous rolls.
    pub length: u8,
}

impl Default for MediaFormat {
    fn default() -> Self {
        MediaFormat {
            high_quality: true,
            continuous: true,
            width: 12,
            length: 0,
        }
    }
}

impl MediaFormat {
    pub fn quality_byte(&self) -> u8 {
        if self.high_quality {
            0xC4
        } else {
            0x00
        }
    }

    pub fn media_kind_byte(&self) -> u8 {
        if self.continuous {
            0x00
        } else {
            0x01
        }
    }

    pub fn length_byte(&self) -> u8 {
        if self.continuous {
            0
        } else {
            self.length
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expanded_mode_feeds_and_cuts_last_label() {
        // Only the inverted no-chain bit is set by default.
        assert_eq!(PrintConfig::default().expanded_mode().bits(), 0b0000_1000);
    }

    #[test]
    fn expanded_mode_bit_assignment() {
        let config = PrintConfig::new()
            .half_cut(true)
            .chain_print(true)
            .label_end_cut(true)
            .high_resolution(true)
            .keep_buffer();
        assert_eq!(config.expanded_mode().bits(), 0b1110_0100);
    }

    #[test]
    fn mode_flags_bit_assignment() {
        assert_eq!(PrintConfig::default().mode_flags().bits(), 0);
        assert_eq!(
            PrintConfig::new().mirror_printing(true).mode_flags().bits(),
            0b1000_0000
        );
        assert_eq!(
            PrintConfig::new().auto_tape_cut(true).mode_flags().bits(),
            0b0100_0000
        );
    }

    #[test]
    fn projections_carry_only_their_own_fields() {
        // A config with every toggle set still projects a margin-only
        // parameter struct for the margin command.
        let config = PrintConfig::new()
            .mirror_printing(true)
            .auto_tape_cut(true)
            .set_margin(0x0102);
        assert_eq!(config.feed_margin(), FeedMargin { margin: 0x0102 });
        assert_eq!(config.feed_margin().bytes(), [0x02, 0x01]);
        assert_eq!(
            config.mode_flags(),
            ModeFlags {
                mirror_printing: true,
                auto_tape_cut: true
            }
        );
    }

    #[test]
    fn continuous_media_forces_zero_length() {
        let media = MediaFormat {
            length: 42,
            ..MediaFormat::default()
        };
        assert_eq!(media.length_byte(), 0);
        assert_eq!(media.quality_byte(), 0xC4);
        assert_eq!(media.media_kind_byte(), 0x00);
    }
}
