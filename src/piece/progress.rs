use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::manager::PieceManager;

const DISPLAY_INTERVAL: Duration = Duration::from_secs(1);
const BAR_WIDTH: usize = 40;

/// Formats a duration in seconds as `H:MM:SS` (or `MM:SS` under an hour).
fn format_time(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn render(manager: &PieceManager, pieces_in_interval: u32) -> String {
    let total = manager.total_pieces();
    let have = manager.have_pieces();

    let downloaded_length = manager.piece_length() as u64 * pieces_in_interval as u64;
    let avg_speed_mbs = downloaded_length as f64 / DISPLAY_INTERVAL.as_secs_f64() / 1_000_000.0;

    let eta = if pieces_in_interval == 0 {
        "inf".to_string()
    } else {
        let time_per_piece = DISPLAY_INTERVAL.as_secs_f64() / pieces_in_interval as f64;
        let remaining = (time_per_piece * (total - have) as f64).ceil().max(0.0) as u64;
        format_time(remaining)
    };

    let progress = have as f64 / total.max(1) as f64;
    let filled = (BAR_WIDTH as f64 * progress) as usize;
    let mut bar = String::with_capacity(BAR_WIDTH + 2);
    bar.push('[');
    for i in 0..BAR_WIDTH {
        if i < filled {
            bar.push('=');
        } else if i == filled {
            bar.push('>');
        } else {
            bar.push(' ');
        }
    }
    bar.push(']');

    let elapsed = manager.started_at().elapsed().as_secs();

    format!(
        "[Peers: {}/{}, {:.2} MB/s, ETA: {}]{} {}/{} [{:.2}%] in {}",
        manager.peer_count(),
        manager.max_connections(),
        avg_speed_mbs,
        eta,
        bar,
        have,
        total,
        progress * 100.0,
        format_time(elapsed)
    )
}

/// Spawns the ~1s-cadence progress ticker thread. Runs until the download
/// completes, printing one `\r`-terminated line per tick followed by a
/// final newline.
pub fn spawn(manager: Arc<PieceManager>) -> JoinHandle<()> {
    thread::spawn(move || {
        thread::sleep(DISPLAY_INTERVAL);
        while !manager.is_complete() {
            let pieces_in_interval = manager.take_pieces_in_interval();
            print!("{}\r", render(&manager, pieces_in_interval));
            let _ = std::io::Write::flush(&mut std::io::stdout());
            thread::sleep(DISPLAY_INTERVAL);
        }
        let pieces_in_interval = manager.take_pieces_in_interval();
        println!("{}", render(&manager, pieces_in_interval));
    })
}
