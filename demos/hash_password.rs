//! Prints an argon2 hash for the given password, using the same hasher
//! configuration as the application. Handy for seeding accounts by hand:
//!
//!     cargo run --example hash_password -- hunter2

use palaver::user::hash_password;

fn main() {
    let password = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "password123".to_string());

    let hash = hash_password(&password).expect("Failed to hash password");
    println!("{}", hash);
}
