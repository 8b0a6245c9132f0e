/* main.rs : RSA-2048 key pair generation and CKM_RSA_PKCS round trip on an HSM,
   with key generation time, throughput, process CPU time and resident memory
   usage: rsa_roundtrip <slotId> <slotPin>   with P11_LIB naming the PKCS#11 module,
          optional P11_ROUNDS for the throughput loops (default 100)
   Functions used:
   C_Initialize
   C_GetSlotList
   C_OpenSession
   C_Login
   C_GenerateKeyPair
   C_EncryptInit
   C_Encrypt
   C_DecryptInit
   C_Decrypt
   C_Logout
   C_CloseSession
   C_Finalize
 */

use std::io::{self, Write};
use std::process::ExitCode;

use p11_roundtrip::measure::{self, ResourceSample};
use p11_roundtrip::{cipher, keys, logging, report, Config, HsmSession, Result, Token};
use tracing::info;

const PLAIN_DATA: &[u8] = b"Earth is the third planet of our Solar System.";

/* key pair generation, round trip, throughput loops and resource report on an authenticated token */
fn measured_round_trip<T: Token, W: Write>(token: &T, rounds: u32, out: &mut W) -> Result<()> {
    let initial = ResourceSample::take();

    let (pair, keygen_time) = measure::timed(|| keys::generate_rsa_key_pair(token));
    let pair = pair?;
    writeln!(out, "RSA Key Pair generation time: {:.6} seconds", keygen_time.as_secs_f64())?;

    let trip = cipher::rsa_round_trip(token, &pair, PLAIN_DATA)?;

    let mechanism = cipher::rsa_pkcs();
    let encryption = measure::throughput(rounds, || {
        cipher::encrypt(token, &mechanism, pair.public, PLAIN_DATA).map(drop)
    })?;
    report::write_throughput(out, "Encryption", &encryption)?;

    let decryption = measure::throughput(rounds, || {
        cipher::decrypt(token, &mechanism, pair.private, &trip.ciphertext).map(drop)
    })?;
    report::write_throughput(out, "Decryption", &decryption)?;
    info!(rounds, "throughput measured");

    let last = ResourceSample::take();
    report::write_resources(out, &initial, &last)?;

    report::write_data(out, "Plain Data", &trip.plaintext)?;
    report::write_data(out, "Encrypted Data", &trip.ciphertext)?;
    report::write_data(out, "Decrypted Data", &trip.decrypted)?;
    trip.verify()
}

fn run() -> Result<()> {
    let config = Config::from_env()?;
    let hsm = HsmSession::open(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "P11 library loaded.")?;
    writeln!(out, "Connected via session: {}", hsm.session_handle())?;

    measured_round_trip(&hsm, config.rounds, &mut out)?;

    hsm.close()?;
    writeln!(out, "Disconnected from slot.")?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    p11_roundtrip::finish(run())
}
