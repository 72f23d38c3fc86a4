use std::env;
use std::error::Error;
use tsaudio::av::MuxingType;
use tsaudio::format::ts::{muxing_for_stream_type, TSAudioAccess, TSDemuxer};

/// Usage: dump_track <file.ts> [pid] [stream_type]
///
/// Without a PID the first audio track of the first program is used.
fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or("usage: dump_track <file.ts> [pid] [stream_type]")?;
    let pid = args.next().map(|s| parse_number(&s)).transpose()?;
    let stream_type = args.next().map(|s| parse_number(&s)).transpose()?;

    // Example 1: find the track
    let mut demuxer = TSDemuxer::open(&path, true)?;
    let (pid, muxing) = match pid {
        Some(pid) => {
            let muxing = stream_type
                .and_then(|t| muxing_for_stream_type(t as u8))
                .unwrap_or(MuxingType::Raw);
            (pid as u16, muxing)
        }
        None => {
            let tracks = demuxer.probe_tracks()?;
            for track in &tracks {
                println!(
                    "pid 0x{:04x}: stream type 0x{:02x} ({:?})",
                    track.pid, track.stream_type, track.muxing
                );
            }
            let track = tracks.first().ok_or("no audio track found")?;
            (track.pid, track.muxing)
        }
    };

    // Example 2: read every access unit and index it
    let mut access = TSAudioAccess::with_source(demuxer, pid, muxing, None);
    let mut buf = vec![0u8; access.config().max_packet_size];
    let mut units = 0u32;
    let mut size = 0u32;
    while let Some(unit) = access.read_packet(&mut buf)? {
        units += 1;
        size += unit.size as u32;
        access.push_seek_point(access.last_pes_position(), unit.dts, size);
    }

    println!("pid 0x{:04x} ({:?}): {} access units", pid, muxing, units);
    if let Some(config) = access.audio_config() {
        println!(
            "  object type {}, {} Hz, {} channel(s)",
            config.object_type, config.sample_rate, config.channel_configuration
        );
    }
    println!("  length:   {} bytes", access.length());
    println!("  duration: {:.3} s", access.duration_us() as f64 / 1_000_000.0);

    // Example 3: seek back to the middle
    let middle = access.duration_us() / 2;
    if access.seek_to(middle) {
        if let Some(unit) = access.read_packet(&mut buf)? {
            println!("  after seek to {} us: {} bytes at {:?}", middle, unit.size, unit.dts);
        }
    }

    access.close();
    Ok(())
}

fn parse_number(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
