//! User interaction seam. The repair and duplicate engines only consume
//! the [`Prompt`] trait; the terminal implementation lives here and the
//! tests substitute scripted ones.

use std::io::{self, BufRead, Write};

/// Questions the engines may ask before touching the filesystem.
pub trait Prompt {
    /// Yes/no confirmation. Returns `false` to leave things untouched.
    fn confirm(&mut self, message: &str) -> bool;

    /// Pick one of `items`. `None` means the user cancelled (empty or
    /// non-numeric input).
    fn choose(&mut self, query: &str, items: &[String]) -> Option<usize>;
}

/// Interactive prompts on stderr/stdin.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        let stdin = io::stdin();
        loop {
            eprint!("{} (y/n): ", message);
            let _ = io::stderr().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return false;
            }
            match line.trim() {
                "y" | "Y" => return true,
                "n" | "N" => return false,
                _ => eprintln!("hint: say y or n"),
            }
        }
    }

    fn choose(&mut self, query: &str, items: &[String]) -> Option<usize> {
        for (i, item) in items.iter().enumerate() {
            eprintln!("[{}] {}", i, item);
        }

        let stdin = io::stdin();
        loop {
            eprint!(
                "* {} (leave blank to skip) [range 0-{}]: ",
                query,
                items.len() - 1
            );
            let _ = io::stderr().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return None;
            }
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match line.parse::<usize>() {
                Ok(choice) if choice < items.len() => return Some(choice),
                Ok(choice) => eprintln!("* {} is not a valid choice, let's try again", choice),
                Err(_) => return None,
            }
        }
    }
}

/// Non-interactive prompt that accepts everything and never chooses.
/// Used where `yes_to_all` semantics are wanted without a terminal.
pub struct AcceptAll;

impl Prompt for AcceptAll {
    fn confirm(&mut self, _message: &str) -> bool {
        true
    }

    fn choose(&mut self, _query: &str, _items: &[String]) -> Option<usize> {
        None
    }
}
