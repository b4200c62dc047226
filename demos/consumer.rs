// In demos/consumer.rs
use mmq_ipc::SPMC::QueueBuilder;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let name = args.get(1).map(String::as_str).unwrap_or("consumer1");
    let start_seq: u64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    println!(
        "Consumer '{}': attaching with start_seq={} to index.mm/data.mm/control.mm",
        name, start_seq
    );

    let mut consumer = match QueueBuilder::new().build_consumer() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Consumer: attach failed: {}", e);
            std::process::exit(1);
        }
    };

    let slot = match consumer.register(name, start_seq) {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("Consumer: register failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Consumer '{}': registered in slot {}", name, slot);

    let keep_alive = Arc::new(AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let mut received = 0usize;
    while keep_alive.load(Ordering::SeqCst) {
        match consumer.drain() {
            Some(view) => {
                received += 1;
                println!(
                    "consumer '{}' got message seq={} ({} bytes): {}",
                    name,
                    view.seq,
                    view.len(),
                    String::from_utf8_lossy(view.payload)
                );
            }
            None => {
                // Block until the producer posts; interrupted waits fall
                // through so Ctrl+C is honored.
                if !consumer.wait() && !keep_alive.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    println!("Consumer '{}': {} messages received, shutting down", name, received);
    consumer.close();
}
