//! Self-describing integrity digests (Subresource-Integrity style).
//!
//! A [`Digest`] is `<algorithm>-<base64>[?opt1?opt2...]`; an [`Integrity`]
//! is a whitespace-separated list of `Digest`s describing the same content
//! under one or more algorithms. The content store keys blobs by the
//! *strongest* algorithm present in an `Integrity` value.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hash algorithms this cache understands, ordered weakest to strongest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            other => bail!("unknown digest algorithm '{}'", other),
        }
    }
}

/// A single `<algorithm>-<base64>[?opts]` integrity string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: Algorithm,
    pub bytes: Vec<u8>,
    pub options: Vec<String>,
}

impl Digest {
    pub fn new(algorithm: Algorithm, bytes: Vec<u8>) -> Self {
        Self {
            algorithm,
            bytes,
            options: Vec::new(),
        }
    }

    /// Lowercase hex encoding of the raw digest bytes, used to derive
    /// content-store paths.
    pub fn hex(&self) -> String {
        hex_encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.algorithm.as_str(),
            base64::encode(&self.bytes)
        )?;
        for opt in &self.options {
            write!(f, "?{}", opt)?;
        }
        Ok(())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut opt_parts = s.split('?');
        let head = opt_parts.next().unwrap_or("");
        let options: Vec<String> = opt_parts.map(str::to_string).collect();

        let (algo, b64) = head
            .split_once('-')
            .with_context(|| format!("malformed digest '{}' - missing '-'", s))?;

        let algorithm: Algorithm = algo
            .parse()
            .with_context(|| format!("malformed digest '{}'", s))?;

        let bytes = base64::decode(b64)
            .with_context(|| format!("malformed digest '{}' - bad base64", s))?;

        Ok(Digest {
            algorithm,
            bytes,
            options,
        })
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One or more [`Digest`]s describing the same content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Integrity(pub Vec<Digest>);

impl Integrity {
    pub fn single(digest: Digest) -> Self {
        Integrity(vec![digest])
    }

    /// The digest with the highest-ranked algorithm; ties keep the first
    /// occurrence. This is the canonical form used for content-store paths.
    pub fn strongest(&self) -> &Digest {
        let mut best = &self.0[0];
        for d in &self.0[1..] {
            if d.algorithm.cmp(&best.algorithm) == Ordering::Greater {
                best = d;
            }
        }
        best
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Integrity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let digests: Result<Vec<Digest>, Error> =
            s.split_whitespace().map(Digest::from_str).collect();
        let digests = digests?;
        if digests.is_empty() {
            bail!("empty integrity string");
        }
        Ok(Integrity(digests))
    }
}

impl Serialize for Integrity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Integrity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

pub fn hex_decode(s: &str) -> Result<Vec<u8>, Error> {
    if s.len() % 2 != 0 {
        bail!("odd-length hex string '{}'", s);
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).with_context(|| format!("bad hex '{}'", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_parse() {
        let digest = Digest::new(Algorithm::Sha512, vec![1, 2, 3, 4, 250]);
        let s = digest.to_string();
        let parsed: Digest = s.parse().unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn strongest_picks_highest_rank() {
        let sha1 = Digest::new(Algorithm::Sha1, vec![1]);
        let sha512 = Digest::new(Algorithm::Sha512, vec![2]);
        let integrity = Integrity(vec![sha1.clone(), sha512.clone()]);
        assert_eq!(integrity.strongest(), &sha512);

        let integrity = Integrity(vec![sha512, sha1]);
        assert_eq!(integrity.strongest().algorithm, Algorithm::Sha512);
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0u8, 1, 2, 253, 254, 255];
        assert_eq!(hex_decode(&hex_encode(&bytes)).unwrap(), bytes);
    }
}
