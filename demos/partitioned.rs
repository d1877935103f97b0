//! Partition routing across four channels, then a broadcast.
//!
//! A producer bound to `[red, blue, black, green]` routes each envelope by
//! `first_hash mod 4`, so hash 2 lands on `black` only; the broadcast then
//! reaches every channel.
//!
//! Run with: `cargo run --example partitioned`

use tokio_util::sync::CancellationToken;

use membus::{Broker, MemStream, MsgEnvelope, MsgPack, MsgStream, Payload, SearchRequest};

const CHANNELS: [&str; 4] = ["red", "blue", "black", "green"];

fn request(id: u64, hash: u32) -> MsgEnvelope {
    MsgEnvelope::new(Payload::SearchRequest(SearchRequest {
        request_id: id,
        query: Vec::new(),
        result_channel: "results-0".into(),
    }))
    .with_hash(hash)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let broker = Broker::new();
    let ctx = CancellationToken::new();

    let mut consumers = Vec::new();
    for channel in CHANNELS {
        let consumer = MemStream::new(broker.clone(), ctx.clone(), 16)?;
        consumer
            .as_consumer(vec![channel.to_string()], &format!("{channel}_consumer"))
            .await?;
        consumers.push(consumer);
    }

    let producer = MemStream::new(broker.clone(), ctx.clone(), 16)?;
    producer
        .as_producer(CHANNELS.iter().map(|c| c.to_string()).collect())
        .await?;
    producer.start();

    // hash 2 mod 4 → index 2 → "black".
    producer
        .produce(&ctx, &MsgPack::from(vec![request(1, 2)]))
        .await?;
    for (channel, consumer) in CHANNELS.iter().zip(&consumers) {
        println!("{channel}: {} pack(s) pending", consumer.pending());
    }

    producer
        .broadcast(&ctx, &MsgPack::from(vec![request(2, 100)]))
        .await?;
    for (channel, consumer) in CHANNELS.iter().zip(&consumers) {
        println!("{channel}: {} pack(s) pending after broadcast", consumer.pending());
    }

    for consumer in &consumers {
        consumer.close().await;
    }
    producer.close().await;
    Ok(())
}
