//! `courier classify` – show the error kind and messages for a status.

use courier_core::classify_status;

pub fn run_classify(status: Option<u16>) {
    let kind = classify_status(status);
    let label = status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "no response".to_string());
    println!("{:<10} {}", "STATUS", label);
    println!("{:<10} {}", "KIND", kind);
    println!("{:<10} {}", "MESSAGE", kind.default_message());
    println!("{:<10} {}", "DISPLAY", kind.display_message());
}
