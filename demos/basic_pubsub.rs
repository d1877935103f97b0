//! Minimal produce/consume round trip on a single channel.
//!
//! Run with: `cargo run --example basic_pubsub`

use tokio_util::sync::CancellationToken;

use membus::{Broker, MemStream, MsgEnvelope, MsgPack, MsgStream, Payload, SearchRequest};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let broker = Broker::new();
    let ctx = CancellationToken::new();

    let consumer = MemStream::new(broker.clone(), ctx.clone(), 16)?;
    consumer
        .as_consumer(vec!["searches".into()], "demo-consumer")
        .await?;

    let producer = MemStream::new(broker.clone(), ctx.clone(), 16)?;
    producer.as_producer(vec!["searches".into()]).await?;
    producer.start();

    let mut pack = MsgPack::with_span(1, 2);
    pack.push(
        MsgEnvelope::new(Payload::SearchRequest(SearchRequest {
            request_id: 42,
            query: b"select *".to_vec(),
            result_channel: "results-0".into(),
        }))
        .with_timestamps(1, 2)
        .with_hash(7),
    );

    producer.produce(&ctx, &pack).await?;
    let delivered = consumer.consume().await?;
    println!(
        "delivered {} envelope(s), kind: {:?}",
        delivered.len(),
        delivered.msgs[0].kind()
    );

    consumer.close().await;
    producer.close().await;
    Ok(())
}
