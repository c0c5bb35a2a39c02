//! Settings key generation.

use parley_server::crypto::SettingsCipher;

/// Print a fresh key suitable for `PARLEY_SETTINGS_KEY`.
pub fn run() {
    let key = SettingsCipher::generate_key();

    #[allow(clippy::print_stdout)]
    {
        println!("{key}");
    }
}
