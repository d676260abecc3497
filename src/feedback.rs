use std::io::{self, Write};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum FeedbackKind {
    Success,
    Failure,
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("no cues registered for {0}")]
    NoCue(FeedbackKind),
    #[error("failed to emit cue: {0}")]
    Io(#[from] io::Error),
}

/// Plays a cue when a tile is hit or missed.
///
/// Best-effort: the session controller logs errors and carries on.
pub trait FeedbackPlayer {
    fn play(&mut self, kind: FeedbackKind) -> Result<(), FeedbackError>;
}

/// Named cues per outcome; one is picked uniformly at random on every play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueBank {
    success: Vec<String>,
    failure: Vec<String>,
}

impl CueBank {
    pub fn new<S: Into<String>>(
        success: impl IntoIterator<Item = S>,
        failure: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            success: success.into_iter().map(Into::into).collect(),
            failure: failure.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cues(&self, kind: FeedbackKind) -> &[String] {
        match kind {
            FeedbackKind::Success => &self.success,
            FeedbackKind::Failure => &self.failure,
        }
    }

    pub fn pick<R: Rng + ?Sized>(&self, kind: FeedbackKind, rng: &mut R) -> Option<&str> {
        self.cues(kind).choose(rng).map(String::as_str)
    }
}

impl Default for CueBank {
    fn default() -> Self {
        Self::new(
            ["chime", "sparkle", "ding"],
            ["buzz", "thud", "clank", "honk"],
        )
    }
}

/// Rings the terminal bell: once for a hit, twice for a miss.
#[derive(Debug)]
pub struct BellPlayer<W: Write> {
    out: W,
    bank: CueBank,
    rng: StdRng,
    enabled: bool,
    last_cue: Option<String>,
}

impl<W: Write> BellPlayer<W> {
    pub fn new(out: W, bank: CueBank) -> Self {
        Self::with_rng(out, bank, StdRng::from_entropy())
    }

    pub fn with_rng(out: W, bank: CueBank, rng: StdRng) -> Self {
        Self {
            out,
            bank,
            rng,
            enabled: true,
            last_cue: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Name of the most recently played cue.
    pub fn last_cue(&self) -> Option<&str> {
        self.last_cue.as_deref()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> FeedbackPlayer for BellPlayer<W> {
    fn play(&mut self, kind: FeedbackKind) -> Result<(), FeedbackError> {
        if !self.enabled {
            return Ok(());
        }

        let cue = self
            .bank
            .pick(kind, &mut self.rng)
            .ok_or(FeedbackError::NoCue(kind))?
            .to_owned();

        let bells: &[u8] = match kind {
            FeedbackKind::Success => b"\x07",
            FeedbackKind::Failure => b"\x07\x07",
        };
        self.out.write_all(bells)?;
        self.out.flush()?;

        tracing::debug!(%kind, cue = %cue, "played cue");
        self.last_cue = Some(cue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn seeded(out: Vec<u8>, bank: CueBank) -> BellPlayer<Vec<u8>> {
        BellPlayer::with_rng(out, bank, StdRng::seed_from_u64(7))
    }

    #[test]
    fn default_bank_sizes() {
        let bank = CueBank::default();
        assert_eq!(bank.cues(FeedbackKind::Success).len(), 3);
        assert_eq!(bank.cues(FeedbackKind::Failure).len(), 4);
    }

    #[test]
    fn pick_covers_every_cue() {
        let bank = CueBank::default();
        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<&str> = (0..200)
            .filter_map(|_| bank.pick(FeedbackKind::Failure, &mut rng))
            .collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn bell_counts_per_kind() {
        let mut player = seeded(Vec::new(), CueBank::default());
        player.play(FeedbackKind::Success).unwrap();
        assert_eq!(player.get_ref().as_slice(), b"\x07");
        player.play(FeedbackKind::Failure).unwrap();
        assert_eq!(player.get_ref().as_slice(), b"\x07\x07\x07");

        let cue = player.last_cue().unwrap();
        assert!(CueBank::default()
            .cues(FeedbackKind::Failure)
            .iter()
            .any(|c| c == cue));
    }

    #[test]
    fn muted_player_emits_nothing() {
        let mut player = seeded(Vec::new(), CueBank::default());
        player.set_enabled(false);
        assert!(!player.is_enabled());
        player.play(FeedbackKind::Success).unwrap();
        assert!(player.get_ref().is_empty());
        assert_eq!(player.last_cue(), None);
    }

    #[test]
    fn empty_bank_is_an_error() {
        let bank = CueBank::new(Vec::<String>::new(), vec!["buzz".to_string()]);
        let mut player = seeded(Vec::new(), bank);
        assert!(matches!(
            player.play(FeedbackKind::Success),
            Err(FeedbackError::NoCue(FeedbackKind::Success))
        ));
        assert!(player.play(FeedbackKind::Failure).is_ok());
    }
}
