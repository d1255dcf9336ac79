/// Display version information
pub fn execute() {
    println!("govdriver {}", env!("CARGO_PKG_VERSION"));
    println!("Governance proposal driver for the friends-of-the-chef allow-list");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        // Version command should not panic
        execute();
    }
}
