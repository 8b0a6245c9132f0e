/* main.rs : AES-256 key generation and CKM_AES_CBC_PAD round trip on an HSM
   usage: aes_roundtrip <slotId> <slotPin>   with P11_LIB naming the PKCS#11 module
   Functions used:
   C_Initialize
   C_GetSlotList
   C_OpenSession
   C_Login
   C_GenerateKey
   C_EncryptInit
   C_Encrypt
   C_DecryptInit
   C_Decrypt
   C_Logout
   C_CloseSession
   C_Finalize
 */

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use p11_roundtrip::{cipher, keys, logging, report, Config, HsmSession, Result, Token};

/* one line from stdin as raw bytes, without its line terminator */
fn read_plain_text<R: BufRead>(input: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    input.read_until(b'\n', &mut line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(line)
}

/* key generation, prompt, round trip and dumps on an authenticated token */
fn round_trip<T: Token, R: BufRead, W: Write>(token: &T, input: &mut R, out: &mut W) -> Result<()> {
    let key = keys::generate_aes_key(token)?;
    writeln!(out, "AES-256 Key generated as handle : {}", key)?;

    write!(out, "Enter the plain text: ")?;
    out.flush()?;
    let plaintext = read_plain_text(input)?;

    writeln!(out)?;
    report::write_hex(out, "Plaindata as Hex -", &plaintext)?;

    let trip = cipher::aes_round_trip(token, key, &plaintext)?;
    report::write_hex(out, "Encrypted Data (Hex) - ", &trip.ciphertext)?;
    report::write_hex(out, "Decrypted data (Hex) -", &trip.decrypted)?;
    report::write_plain(out, "Decrypted data (Plain text) -", &trip.decrypted)?;
    trip.verify()
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    let hsm = HsmSession::open(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "P11 library loaded.")?;
    writeln!(out, "Connected via session : {}", hsm.session_handle())?;

    round_trip(&hsm, &mut io::stdin().lock(), &mut out)?;

    hsm.close()?;
    writeln!(out, "Disconnected from slot.")?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    p11_roundtrip::finish(run())
}
