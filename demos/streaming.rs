use std::path::PathBuf;
use std::time::{Duration, Instant};

use tts_stream::engines::{EngineBackend, ToneEngine};
use tts_stream::{audio, StreamOutcome, StreamingTts, TtsOptionsBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = TtsOptionsBuilder::default()
        .voice("longxiaochun")
        .rate(1.2f32)
        .volume(60u8)
        .build()?;
    let backend = EngineBackend::new(ToneEngine::new(options.sample_rate()));
    let tts = StreamingTts::new(options, backend)?;

    // Simulates text arriving token by token from a language model.
    let fragments = [
        "今天天气很好，",
        "我们去公园散步吧。明天",
        "再去图书馆看书。",
        "Streaming synthesis starts ",
        "before the whole text is known!",
    ];

    let start = Instant::now();
    let mut stream = tts.stream();
    println!("Request {} started", stream.request_id());

    for fragment in fragments {
        stream.push_text(fragment)?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    stream.flush()?;
    stream.end_input()?;

    let mut frames = Vec::new();
    let mut first_audio = None;
    while let Some(audio) = stream.recv().await {
        first_audio.get_or_insert_with(|| start.elapsed());
        frames.push(audio.frame);
    }
    let outcome = stream.join().await?;
    let total = start.elapsed();

    let audio_duration: Duration = frames.iter().map(|f| f.duration()).sum();
    println!(
        "Received {} frames ({:.2}s audio) in {:.2?}, first audio after {:.2?}",
        frames.len(),
        audio_duration.as_secs_f64(),
        total,
        first_audio.unwrap_or_default()
    );

    if outcome == StreamOutcome::Completed {
        audio::write_wav(&frames, &PathBuf::from("output.wav"))?;
        println!("Saved to output.wav");
    }
    Ok(())
}
