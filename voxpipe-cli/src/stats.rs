//! Statistics display and formatting

use std::time::Duration;
use voxpipe::PacerStats;
use voxpipe_io::time::frames_duration;
use voxpipe_protocol::sequence::SeqNumber;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Receive-side counters
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    pub packets: u64,
    pub bytes: u64,
    /// Datagrams that failed authentication
    pub rejected: u64,
    /// Gaps in the sequence space
    pub lost: u64,
    /// Packets arriving behind the highest sequence number
    pub reordered: u64,
    highest: Option<SeqNumber>,
}

impl ReceiverStats {
    /// Record an authenticated packet
    pub fn record(&mut self, sequence: u16, len: usize) {
        let seq = SeqNumber::new(sequence);
        self.packets += 1;
        self.bytes += len as u64;

        match self.highest {
            None => self.highest = Some(seq),
            Some(highest) => {
                let distance = highest.distance_to(seq);
                if distance > 0 {
                    self.lost += (distance - 1) as u64;
                    self.highest = Some(seq);
                } else {
                    self.reordered += 1;
                }
            }
        }
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Audio received, assuming 20ms frames
    pub fn audio_duration(&self) -> Duration {
        frames_duration(self.packets)
    }
}

/// Display sender statistics
pub fn display_pacer_stats(stats: &PacerStats, elapsed: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ SENDER STATISTICS                                           │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Frames:   {} sent ({} silence)",
        stats.frames_sent, stats.silence_frames
    );
    println!("│ Bytes:    {}", format_bytes(stats.bytes_sent));
    println!(
        "│ Audio:    {} in {}",
        format_duration(stats.position()),
        format_duration(elapsed)
    );
    println!(
        "│ Avg frame processing: {:.3} ms",
        stats.average_processing_time().as_secs_f64() * 1000.0
    );
    println!("│ Speaking transitions: {}", stats.speaking_transitions);
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Display receiver stats on one line (for continuous updates)
pub fn display_compact_stats(stats: &ReceiverStats, elapsed: Duration) {
    eprint!(
        "\r[{:8}] Packets: {} | Audio: {} | Bytes: {} | Lost: {} | Rejected: {}         ",
        format_duration(elapsed),
        stats.packets,
        format_duration(stats.audio_duration()),
        format_bytes(stats.bytes),
        stats.lost,
        stats.rejected
    );
}
