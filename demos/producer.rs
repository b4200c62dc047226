// In demos/producer.rs
use mmq_ipc::SPMC::QueueBuilder;
use sha2::{Digest, Sha256};
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mut message_count: usize = 1200;
    let mut cleanup = false;
    for arg in &args[1..] {
        if arg == "--cleanup" {
            cleanup = true;
        } else if let Ok(n) = arg.parse() {
            message_count = n;
        } else {
            eprintln!("Usage: {} [message_count] [--cleanup]", args[0]);
            std::process::exit(1);
        }
    }

    println!(
        "Producer: publishing {} messages to index.mm/data.mm/control.mm",
        message_count
    );

    // Precompute payloads; each carries its index and a sha256 stamp so a
    // consumer can verify what it read.
    let start_precompute = std::time::Instant::now();
    let pid = std::process::id();
    let mut payloads = Vec::with_capacity(message_count);
    for i in 0..message_count {
        let mut hasher = Sha256::new();
        hasher.update(format!("message_{}", i).as_bytes());
        let hash_hex = format!("{:x}", hasher.finalize());
        payloads.push(format!("{}:{}:pid={}", i, hash_hex, pid));
    }
    println!(
        "Producer: precomputed {} payloads in {:.2?}",
        message_count,
        start_precompute.elapsed()
    );

    let mut producer = match QueueBuilder::new().build_producer() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Producer: init failed: {}", e);
            std::process::exit(1);
        }
    };

    let keep_alive = Arc::new(AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start_send = std::time::Instant::now();
    let mut sent = 0usize;
    for payload in &payloads {
        if !keep_alive.load(Ordering::SeqCst) {
            println!("\nProducer: interrupted after {} messages", sent);
            break;
        }
        match producer.publish(payload.as_bytes()) {
            Ok(_seq) => {
                sent += 1;
                print!("\rproduced {} messages...", sent);
                let _ = std::io::stdout().flush();
            }
            Err(e) => {
                eprintln!("\nProducer: publish failed: {}", e);
                std::process::exit(1);
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    let send_time = start_send.elapsed();

    println!("\n{}", "=".repeat(60));
    println!("PRODUCER STATISTICS");
    println!("{}", "=".repeat(60));
    println!("Messages sent:   {}", sent);
    println!("Time taken:      {:.3?}", send_time);
    println!(
        "Throughput:      {:.2} messages/sec",
        sent as f64 / send_time.as_secs_f64()
    );
    println!("Next sequence:   {}", producer.next_seq());

    if cleanup {
        if let Err(e) = producer.unlink_semaphores() {
            eprintln!("Producer: semaphore unlink failed: {}", e);
        }
    }
    producer.close();
    println!("Producer: shut down");
}
