use crate::util::Face;
use enum_map::EnumMap;
use rand::Rng;
use tracing::info;

/// Number of previous throws kept on screen.
pub const HISTORY_LEN: usize = 3;

/// Previous throws, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollHistory {
    faces: Vec<Face>,
}

impl RollHistory {
    /// Prepends `face`, dropping whatever falls past the last slot.
    pub fn push(&mut self, face: Face) {
        self.faces.insert(0, face);
        self.faces.truncate(HISTORY_LEN);
    }

    pub fn newest(&self) -> Option<Face> {
        self.faces.first().copied()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Playing,
    Finished,
}

/// What the display gets after a throw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throw {
    pub current: Face,
    pub history: Vec<Face>,
    pub won: bool,
}

/// One game: the face on top, the throws before it and whether it's over.
#[derive(Debug, Clone, Default)]
pub struct DiceTracker {
    history: RollHistory,
    last: Option<Face>,
    status: GameStatus,
    rolls: EnumMap<Face, u32>,
}

impl DiceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throws the die with `rng`.
    pub fn throw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Throw {
        let face = Face::roll(rng);
        self.push(face)
    }

    /// Records `face` as the new throw and checks for a win.
    ///
    /// The previous face moves into the history first, so the comparison is
    /// against the throw right before this one.
    pub fn push(&mut self, face: Face) -> Throw {
        if let Some(last) = self.last {
            self.history.push(last);
        }
        self.last = Some(face);
        self.rolls[face] += 1;

        let won = self.history.newest() == Some(face);
        if won {
            self.status = GameStatus::Finished;
            info!(face = face.id(), "game won");
        } else {
            info!(face = face.id(), history = ?self.history.faces(), "throw");
        }

        Throw {
            current: face,
            history: self.history.faces().to_vec(),
            won,
        }
    }

    pub fn history(&self) -> &RollHistory {
        &self.history
    }

    pub fn current(&self) -> Option<Face> {
        self.last
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// How often each face came up this game.
    pub fn rolls(&self) -> &EnumMap<Face, u32> {
        &self.rolls
    }

    pub fn total_rolls(&self) -> u32 {
        self.rolls.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{DiceTracker, GameStatus, RollHistory, HISTORY_LEN};
    use crate::util::Face;
    use rand::{rngs::StdRng, SeedableRng};

    fn faces(ids: &[u8]) -> Vec<Face> {
        ids.iter().map(|&id| Face::try_from(id).unwrap()).collect()
    }

    fn play(ids: &[u8]) -> (DiceTracker, Vec<bool>) {
        let mut tracker = DiceTracker::new();
        let wins = faces(ids).into_iter().map(|f| tracker.push(f).won).collect();
        (tracker, wins)
    }

    #[test]
    fn test_history_prepends_and_truncates() {
        let mut history = RollHistory::default();
        for face in faces(&[1, 2, 3, 4, 5]) {
            history.push(face);
            assert!(history.faces().len() <= HISTORY_LEN);
        }
        assert_eq!(history.faces(), faces(&[5, 4, 3]).as_slice());
        assert_eq!(history.newest(), Some(Face::Five));
    }

    #[test]
    fn test_three_five_three() {
        let (tracker, wins) = play(&[3, 5, 3]);
        assert_eq!(wins, vec![false, false, false]);
        assert_eq!(tracker.history().faces(), faces(&[5, 3]).as_slice());
        assert_eq!(tracker.current(), Some(Face::Three));
        assert_eq!(tracker.status(), GameStatus::Playing);
    }

    #[test]
    fn test_two_four_two() {
        let (tracker, wins) = play(&[2, 4, 2]);
        assert_eq!(wins, vec![false, false, false]);
        assert!(!tracker.is_finished());
    }

    #[test]
    fn test_repeat_wins() {
        let (tracker, wins) = play(&[6, 1, 1]);
        assert_eq!(wins, vec![false, false, true]);
        assert_eq!(tracker.status(), GameStatus::Finished);
        assert_eq!(tracker.history().faces(), faces(&[1, 6]).as_slice());
    }

    #[test]
    fn test_four_four() {
        let (tracker, wins) = play(&[4, 4]);
        assert_eq!(wins, vec![false, true]);
        assert_eq!(tracker.history().faces(), faces(&[4]).as_slice());
        assert_eq!(tracker.status(), GameStatus::Finished);
    }

    #[test]
    fn test_first_throw_never_wins() {
        let (tracker, wins) = play(&[4]);
        assert_eq!(wins, vec![false]);
        assert!(tracker.history().faces().is_empty());
    }

    #[test]
    fn test_throw_snapshot() {
        let mut tracker = DiceTracker::new();
        for face in faces(&[1, 2, 3, 4]) {
            tracker.push(face);
        }
        let throw = tracker.push(Face::Five);
        assert_eq!(throw.current, Face::Five);
        assert_eq!(throw.history, faces(&[4, 3, 2]));
        assert!(!throw.won);
    }

    #[test]
    fn test_random_games() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let mut tracker = DiceTracker::new();
            let mut previous = None;
            loop {
                let throw = tracker.throw(&mut rng);
                assert!(throw.history.len() <= HISTORY_LEN);
                assert_eq!(throw.won, previous == Some(throw.current));
                previous = Some(throw.current);
                if throw.won {
                    break;
                }
            }
            assert!(tracker.is_finished());
            assert!(tracker.total_rolls() >= 2);
        }
    }

    #[test]
    fn test_roll_counts() {
        let (tracker, _) = play(&[2, 3, 2, 5]);
        assert_eq!(tracker.rolls()[Face::Two], 2);
        assert_eq!(tracker.rolls()[Face::Six], 0);
        assert_eq!(tracker.total_rolls(), 4);
    }
}
