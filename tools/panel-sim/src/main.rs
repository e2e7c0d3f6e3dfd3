//! Host simulation of the display runtime.
//!
//! Runs the firmware frame loop against a fake panel: a thread stands in for
//! the DMA engine and calls `transmit_end` when each transfer "completes".
//!
//! ```text
//! panel-sim [FRAMES] [single|double]
//! ```
//!
//! Log verbosity comes from `PANEL_SIM_LOG` (`error` .. `trace`, default
//! `info`).

mod logger;

use crate::logger::StdoutLogger;
use log::{LevelFilter, debug, info, warn};
use panel_alloc::{MemPool, PoolError, StaticArena};
use panel_fb::{
    Buffering, DisplayConfig, DisplayLink, Framebuffer, FramebufferError, Region, TransferSignal,
    TransferSync,
};
use panel_sync::SpinExclusive;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use std::{env, process};

const ARENA_SIZE: usize = 1024 * 1024;
const DEFAULT_FRAMES: u32 = 60;

/// Simulated link bandwidth (SPI at ~50 MHz).
const BYTES_PER_MICROSECOND: usize = 6;

/// Per-wait budget; far above any simulated transfer.
const WAIT_BUDGET: Duration = Duration::from_millis(500);

static ARENA: StaticArena<ARENA_SIZE> = StaticArena::new();
static POOL: MemPool = MemPool::new();
static TE: TransferSignal = TransferSignal::new();
static TRANSFERS: SpinExclusive<u64> = SpinExclusive::new(0);

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("usage: panel-sim [FRAMES] [single|double] ({0})")]
    Usage(String),
    #[error("pool: {0}")]
    Pool(#[from] PoolError),
    #[error("framebuffer: {0}")]
    Framebuffer(#[from] FramebufferError),
    #[error("arena already taken")]
    ArenaTaken,
}

struct Options {
    frames: u32,
    buffering: Buffering,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, SimError> {
        let frames = match args.next() {
            None => DEFAULT_FRAMES,
            Some(n) => n
                .parse()
                .map_err(|_| SimError::Usage(format!("bad frame count {n:?}")))?,
        };
        let buffering = match args.next().as_deref() {
            None | Some("double") => Buffering::Double,
            Some("single") => Buffering::Single,
            Some(other) => return Err(SimError::Usage(format!("bad buffering {other:?}"))),
        };
        Ok(Self { frames, buffering })
    }
}

/// What the fake DMA engine is asked to move.
enum Transfer {
    Frame(usize),
    Row(Region, usize),
}

/// Hands transfers to the DMA thread instead of a bus.
struct DmaLink {
    queue: Sender<Transfer>,
}

impl DisplayLink for DmaLink {
    fn send_frame(&mut self, frame: &[u8]) {
        if self.queue.send(Transfer::Frame(frame.len())).is_err() {
            warn!("dma: engine stopped, frame dropped");
        }
    }

    fn send_region(&mut self, region: Region, pixels: &[u8]) {
        if self.queue.send(Transfer::Row(region, pixels.len())).is_err() {
            warn!("dma: engine stopped, row dropped");
        }
    }
}

/// The DMA engine: "transmits" each request, then raises the completion
/// interrupt.
fn dma_engine(queue: &Receiver<Transfer>) {
    while let Ok(transfer) = queue.recv() {
        let bytes = match transfer {
            Transfer::Frame(bytes) => bytes,
            Transfer::Row(region, bytes) => {
                debug_assert_eq!(region.h, 1);
                bytes
            }
        };
        thread::sleep(Duration::from_micros((bytes / BYTES_PER_MICROSECOND) as u64));
        TRANSFERS.with(|n| *n += 1);
        TE.transmit_end();
    }
}

/// Diagonal gradient that scrolls with `frame`.
#[allow(clippy::cast_possible_truncation)]
fn render(fb: &mut Framebuffer<'_, DmaLink>, frame: u32) {
    let g = fb.geometry();
    let bpp = g.depth.bytes();
    let shift = frame as usize;
    let buf = fb.draw_buffer_mut();
    for y in 0..usize::from(g.height) {
        let row = &mut buf[y * g.stride..(y + 1) * g.stride];
        for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
            let v = (x + y + shift) as u8;
            px.fill(v);
        }
    }
}

fn run(options: &Options) -> Result<(), SimError> {
    POOL.init_static(ARENA.take().ok_or(SimError::ArenaTaken)?)?;

    let config = DisplayConfig::DEFAULT
        .with_buffering(options.buffering)
        .with_sync(TransferSync::CompletionSignal);
    let mut fb = Framebuffer::init(&config, &POOL, Some(&TE))?;

    let (tx, rx) = mpsc::channel();
    fb.set_link(DmaLink { queue: tx });
    let engine = thread::spawn(move || dma_engine(&rx));

    let started = Instant::now();
    for frame in 0..options.frames {
        render(&mut fb, frame);

        // Every tenth frame only refreshes a status strip.
        if frame % 10 == 9 {
            fb.commit_region(0, 0, config.width, 16)?;
        } else {
            fb.commit();
        }

        let deadline = Instant::now() + WAIT_BUDGET;
        fb.wait_transfer_end(move || Instant::now() >= deadline)?;
        fb.swap_buffers();
    }
    let elapsed = started.elapsed();

    let stats = POOL.stats();
    info!(
        "{} frames in {elapsed:?}, {} transfers",
        options.frames,
        TRANSFERS.with(|n| *n)
    );
    info!(
        "pool: {} / {} bytes used in {} blocks, largest free block {}",
        stats.used_bytes, stats.pool_size, stats.allocated_blocks, stats.largest_free_block
    );

    // Dropping the link closes the queue and stops the engine.
    drop(fb.take_link());
    if engine.join().is_err() {
        warn!("dma: engine panicked");
    }

    fb.release(&POOL);
    debug!("pool after release: {:?}", POOL.stats());
    Ok(())
}

fn main() {
    let level = env::var("PANEL_SIM_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Info);
    if StdoutLogger::new(level).init().is_err() {
        eprintln!("panel-sim: logger already installed");
    }

    let result = Options::parse(env::args().skip(1)).and_then(|options| run(&options));
    if let Err(e) = result {
        eprintln!("panel-sim: {e}");
        process::exit(match e {
            SimError::Usage(_) => 2,
            _ => 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(ToString::to_string).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn options_default_to_double_buffering() {
        let o = Options::parse(args(&[])).unwrap();
        assert_eq!(o.frames, DEFAULT_FRAMES);
        assert_eq!(o.buffering, Buffering::Double);
    }

    #[test]
    fn options_parse_frames_and_mode() {
        let o = Options::parse(args(&["5", "single"])).unwrap();
        assert_eq!(o.frames, 5);
        assert_eq!(o.buffering, Buffering::Single);
    }

    #[test]
    fn bad_options_are_usage_errors() {
        assert!(matches!(Options::parse(args(&["lots"])), Err(SimError::Usage(_))));
        assert!(matches!(
            Options::parse(args(&["3", "triple"])),
            Err(SimError::Usage(_))
        ));
    }
}
