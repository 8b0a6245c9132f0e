/* config.rs : command line and environment of both programs
   <program> <slotId> <slotPin>   with P11_LIB set to the path of the PKCS#11 module
 */

use std::fmt;

use crate::error::{HsmError, Result};

pub const LIBRARY_ENV: &str = "P11_LIB";
pub const ROUNDS_ENV: &str = "P11_ROUNDS";
pub const DEFAULT_ROUNDS: u32 = 100;

/// The two positional arguments.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub slot_id: u64,
    pub pin: String,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("slot_id", &self.slot_id)
            .field("pin", &"***")
            .finish()
    }
}

pub fn parse_args<I>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let program = args.next().unwrap_or_else(|| "p11_roundtrip".to_string());
    let rest: Vec<String> = args.collect();
    let [slot, pin] = <[String; 2]>::try_from(rest).map_err(|_| HsmError::Usage { program: program.clone() })?;

    let slot_id = slot
        .trim()
        .parse::<u64>()
        .map_err(|source| HsmError::InvalidSlot { value: slot.clone(), source })?;

    Ok(Invocation { program, slot_id, pin })
}

#[derive(Clone)]
pub struct Config {
    pub invocation: Invocation,
    pub library: String,
    /// repetitions for the throughput figures of the RSA program
    pub rounds: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("invocation", &self.invocation)
            .field("library", &self.library)
            .field("rounds", &self.rounds)
            .finish()
    }
}

impl Config {
    /// The command line is checked before the environment: a wrong argument
    /// count prints usage even when `P11_LIB` is missing.
    pub fn load<I, F>(args: I, lookup: F) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let invocation = parse_args(args)?;

        let library = lookup(LIBRARY_ENV)
            .filter(|path| !path.trim().is_empty())
            .ok_or(HsmError::MissingLibrary)?;

        let rounds = match lookup(ROUNDS_ENV) {
            None => DEFAULT_ROUNDS,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(HsmError::InvalidRounds(value)),
            },
        };

        Ok(Config { invocation, library, rounds })
    }

    pub fn from_env() -> Result<Self> {
        Self::load(std::env::args(), |key| std::env::var(key).ok())
    }

    pub fn slot_id(&self) -> u64 {
        self.invocation.slot_id
    }

    pub fn pin(&self) -> &str {
        &self.invocation.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_args() {
        let inv = parse_args(args(&["aes_roundtrip", "0", "1234"])).unwrap();
        assert_eq!(inv.program, "aes_roundtrip");
        assert_eq!(inv.slot_id, 0);
        assert_eq!(inv.pin, "1234");
    }

    #[test]
    fn test_parse_args_wrong_count_is_usage() {
        for list in [&["rsa_roundtrip"][..], &["rsa_roundtrip", "0"], &["rsa_roundtrip", "0", "1234", "x"]] {
            match parse_args(args(list)) {
                Err(HsmError::Usage { program }) => assert_eq!(program, "rsa_roundtrip"),
                other => panic!("expected usage, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_args_bad_slot() {
        match parse_args(args(&["aes_roundtrip", "zero", "1234"])) {
            Err(HsmError::InvalidSlot { value, .. }) => assert_eq!(value, "zero"),
            other => panic!("expected invalid slot, got {:?}", other),
        }
        assert!(matches!(parse_args(args(&["aes_roundtrip", "-1", "1234"])), Err(HsmError::InvalidSlot { .. })));
    }

    #[test]
    fn test_load_requires_library() {
        let res = Config::load(args(&["aes_roundtrip", "0", "1234"]), env(&[]));
        assert!(matches!(res, Err(HsmError::MissingLibrary)));
        let res = Config::load(args(&["aes_roundtrip", "0", "1234"]), env(&[(LIBRARY_ENV, "  ")]));
        assert!(matches!(res, Err(HsmError::MissingLibrary)));
    }

    #[test]
    fn test_load_usage_before_library() {
        let res = Config::load(args(&["aes_roundtrip"]), env(&[]));
        assert!(matches!(res, Err(HsmError::Usage { .. })));
    }

    #[test]
    fn test_load_rounds() {
        let cfg = Config::load(args(&["rsa_roundtrip", "3", "1234"]), env(&[(LIBRARY_ENV, "/usr/lib/softhsm/libsofthsm2.so")])).unwrap();
        assert_eq!(cfg.library, "/usr/lib/softhsm/libsofthsm2.so");
        assert_eq!(cfg.slot_id(), 3);
        assert_eq!(cfg.pin(), "1234");
        assert_eq!(cfg.rounds, DEFAULT_ROUNDS);

        let cfg = Config::load(args(&["rsa_roundtrip", "3", "1234"]), env(&[(LIBRARY_ENV, "lib.so"), (ROUNDS_ENV, "5")])).unwrap();
        assert_eq!(cfg.rounds, 5);

        for bad in ["0", "many", "-2"] {
            let res = Config::load(args(&["rsa_roundtrip", "3", "1234"]), env(&[(LIBRARY_ENV, "lib.so"), (ROUNDS_ENV, bad)]));
            assert!(matches!(res, Err(HsmError::InvalidRounds(_))));
        }
    }

    #[test]
    fn test_debug_hides_pin() {
        let cfg = Config::load(args(&["aes_roundtrip", "0", "secret-pin"]), env(&[(LIBRARY_ENV, "lib.so")])).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("secret-pin"));
        assert!(dbg.contains("lib.so"));
    }
}
