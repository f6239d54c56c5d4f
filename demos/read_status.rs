use ptlabel::{MediaFormat, PrintConfig, Printer, SerialTransport};
//
// cargo run --example read_status /dev/ttyUSB0
//

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        println!("usage: read_status <serial-device-path>");
        return;
    }

    match SerialTransport::open(&args[1]) {
        Ok(transport) => {
            let mut printer = Printer::new(transport, PrintConfig::new(), MediaFormat::default());
            match printer.query_status() {
                Ok(status) => println!("{}", status),
                Err(err) => println!("Error {:?}", err),
            }
        }
        Err(err) => panic!("Could not open {}: {}", args[1], err),
    }
}
