use std::io::{self, BufRead, Write};

use musr_asym::{ConfirmationPolicy, GeometryMismatch};

/// Asks on stderr whether to accept a geometry mismatch and reads `y`/`n` from stdin.
///
/// End of input or a read error declines.
pub struct ConsolePolicy<R> {
    input: R,
}

impl ConsolePolicy<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> ConsolePolicy<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> ConfirmationPolicy for ConsolePolicy<R> {
    fn confirm(&mut self, mismatch: &GeometryMismatch) -> bool {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "Mismatch in number and/or length of histograms: {mismatch}");
        loop {
            let _ = write!(stderr, "Proceed anyway? (y/n) ");
            let _ = stderr.flush();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            match line.trim().to_lowercase().chars().next() {
                Some('y') => return true,
                Some('n') => return false,
                _ => continue,
            }
        }
    }
}
