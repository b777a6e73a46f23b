use concurrent_queue_rs::ConcurrentQueue;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    println!("ConcurrentQueue Rust Example");
    println!("----------------------------\n");

    // Configuration
    const PRODUCERS: usize = 2; // Number of producer threads
    const CONSUMERS: usize = 2; // Number of consumer threads
    const N: u32 = 100_000; // Each producer pushes this many elements into the queue

    // Create a queue object shared between all producers and consumers
    let queue = Arc::new(ConcurrentQueue::new());

    println!("Starting {} producers and {} consumers", PRODUCERS, CONSUMERS);
    println!("Each producer will push {} elements\n", N);

    let start_time = Instant::now();

    // Start the consumers
    let sums_arc = Arc::new(std::sync::Mutex::new(vec![0u64; CONSUMERS]));
    let mut consumer_threads = Vec::with_capacity(CONSUMERS);

    for i in 0..CONSUMERS {
        let q = queue.clone();
        let sums = sums_arc.clone();
        consumer_threads.push(thread::spawn(move || {
            let mut local_sum = 0u64;

            // Block for elements; a 0 is the termination signal
            while let Some(n) = q.try_pop_for(Duration::from_secs(10)) {
                if n == 0 {
                    break;
                }
                local_sum += n as u64;
            }

            // Update the global sum array (only once to avoid false sharing)
            let mut sums = sums.lock().unwrap();
            sums[i] = local_sum;
        }));
    }

    // Start the producers
    let mut producer_threads = Vec::with_capacity(PRODUCERS);

    for _ in 0..PRODUCERS {
        let q = queue.clone();
        producer_threads.push(thread::spawn(move || {
            // Push elements in descending order [N, 1]
            for n in (1..=N).rev() {
                q.push(n);
            }
        }));
    }

    // Wait for all producers to finish
    for handle in producer_threads {
        handle.join().unwrap();
    }

    // Tell consumers to terminate by pushing one 0 for each consumer
    for _ in 0..CONSUMERS {
        queue.push(0);
    }

    // Wait for all consumers to finish
    for handle in consumer_threads {
        handle.join().unwrap();
    }

    // Calculate and verify the total sum
    let sums = sums_arc.lock().unwrap();
    let total_sum: u64 = sums.iter().sum();

    // The expected sum is N*(N+1)/2 * PRODUCERS
    let expected_sum: u64 = (N as u64 * (N as u64 + 1) / 2) * PRODUCERS as u64;

    println!("Execution time: {:?}", start_time.elapsed());
    println!("Total sum: {}", total_sum);
    println!("Expected sum: {}", expected_sum);

    if total_sum != expected_sum {
        println!(
            "ERROR: Sum mismatch! Difference: {}",
            total_sum as i64 - expected_sum as i64
        );
    } else {
        println!("SUCCESS: All elements were correctly processed.");
    }

    // Show per-consumer stats
    println!("\nPer-consumer statistics:");
    for (i, &sum) in sums.iter().enumerate() {
        println!("Consumer {}: sum = {}", i, sum);
        if sum == 0 {
            println!("WARNING: Consumer {} received no elements!", i);
        }
    }

    // Lock-guarded iteration over whatever is left (should be nothing)
    let leftovers = queue.read();
    println!("\nElements left in the queue: {}", leftovers.len());
    for value in leftovers.iter() {
        println!("  leftover: {}", value);
    }
}
