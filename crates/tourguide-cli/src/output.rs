use colored::Colorize;
use serde_json::Value;
use tourguide_cache::CacheStats;

pub fn print_value(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn print_stats(stats: &CacheStats) {
    let available = match stats.backend_available {
        Some(true) => "yes".green(),
        Some(false) => "no".red(),
        None => "unknown".yellow(),
    };
    println!("{}: {}", "Mode".cyan(), stats.mode);
    println!("{}: {}", "Backend available".cyan(), available);
    println!("{}: {}", "Memory entries".cyan(), stats.memory_entries);
    println!("{}: {}", "Pending requests".cyan(), stats.pending_requests);
    println!(
        "{}: {} hits / {} misses ({:.1}%)",
        "Hit rate".cyan(),
        stats.hits,
        stats.misses,
        stats.hit_rate()
    );
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
