use std::time::{Duration, Instant};

use tokio_stream::StreamExt as _;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() {
    let n: usize = env_or("N", 16);
    let chunks: usize = env_or("CHUNKS", 50);
    let bytes: usize = env_or("BYTES", 128);
    let delay_ms: u64 = env_or("DELAY_MS", 0);
    let base = std::env::var("URL").unwrap_or_else(|_| "http://127.0.0.1:8000/v1/chat/completions".into());
    let url = format!("{}?chunks={}&bytes={}&delay_ms={}", base, chunks, bytes, delay_ms);

    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut tasks = Vec::new();
    for _ in 0..n {
        let c = client.clone();
        let u = url.clone();
        tasks.push(tokio::spawn(async move {
            let sent = Instant::now();
            let resp = c.post(&u).send().await.ok()?;
            let mut body = Box::pin(resp.bytes_stream());
            let mut first_line: Option<Duration> = None;
            let mut lines = 0usize;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.ok()?;
                let newlines = chunk.iter().filter(|b| **b == b'\n').count();
                if newlines > 0 && first_line.is_none() {
                    first_line = Some(sent.elapsed());
                }
                lines += newlines;
            }
            Some((lines, first_line?))
        }));
    }

    let mut ok = 0usize;
    let mut short = 0usize;
    let mut ttfl = Duration::ZERO;
    for t in tasks {
        if let Some((lines, first)) = t.await.ok().flatten() {
            if lines != chunks + 1 { short += 1; }
            ok += 1;
            ttfl += first;
        }
    }
    println!("completed {} of {} streams in {:.2}s", ok, n, start.elapsed().as_secs_f32());
    if ok > 0 {
        println!("mean time to first line: {:.2}ms", ttfl.as_secs_f64() * 1000.0 / ok as f64);
    }
    if short > 0 {
        println!("{} streams had an unexpected line count", short);
    }
}
