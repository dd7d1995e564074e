use crate::dice_tracker::{DiceTracker, GameStatus, Throw};
use crate::shake::{now_millis, AccelerationSample, ShakeDetector, ShakeEvent};
use crate::util::{format_str, Face};
use enum_map::EnumMap;
use rand::{rngs::StdRng, SeedableRng};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const NUM: &str = r"([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)";
const STAMP: &str = r"(\d+)";

type Handler = fn(&mut Session, &[&str]);

/// Builds the patterns for sample lines we can read from the sensor feed
fn build_patterns() -> [(Regex, Handler); 2] {
    [
        (
            Regex::new(&format!(r"^{STAMP}\s+{NUM}\s+{NUM}\s+{NUM}$")).unwrap(),
            Session::handle_stamped_sample,
        ),
        (
            Regex::new(&format!(r"^{NUM}\s+{NUM}\s+{NUM}$")).unwrap(),
            Session::handle_sample,
        ),
    ]
}

/// Where sample timestamps come from. A feed sticks to one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clock {
    /// Timestamps carried by the samples themselves
    Feed,
    /// Wall clock at the time the line is read
    Wall,
}

/// The finish dialog shown after a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    Hidden,
    Won(Face),
}

/// A running game screen: sensor hookup, shake detection, the game itself
/// and the win dialog.
pub struct Session {
    detector: ShakeDetector,
    tracker: DiceTracker,
    rng: StdRng,
    events: [(Regex, Handler); 2],
    clock: Option<Clock>,
    listening: bool,
    dialog: Dialog,
    replay_visible: bool,
}

impl Session {
    pub fn new(rng: StdRng) -> Self {
        Self {
            detector: ShakeDetector::new(),
            tracker: DiceTracker::new(),
            rng,
            events: build_patterns(),
            clock: None,
            listening: true,
            dialog: Dialog::Hidden,
            replay_visible: false,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &DiceTracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn detector(&self) -> &ShakeDetector {
        &self.detector
    }

    #[cfg(test)]
    pub fn dialog(&self) -> Dialog {
        self.dialog
    }

    #[cfg(test)]
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    #[cfg(test)]
    pub fn replay_visible(&self) -> bool {
        self.replay_visible
    }

    /// Parses one line of input: a sample, a JSON sample or a command
    pub fn parse_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        if line.starts_with('{') {
            self.handle_json(line);
            return;
        }
        for i in 0..self.events.len() {
            let (regex, event) = &self.events[i];
            let event = *event;
            if let Some(caps) = regex.captures(line) {
                let args = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map_or("", |m| m.as_str()))
                    .collect::<Vec<_>>();
                event(self, &args);
                return; // a line is either one sample or a command
            }
        }
        self.parse_command(line);
    }

    fn handle_stamped_sample(&mut self, event: &[&str]) {
        let Ok(now) = event[0].parse::<u64>() else {
            debug!(stamp = event[0], "bad timestamp");
            return;
        };
        if self.use_clock(Clock::Feed) {
            let values = parse_values(&event[1..]);
            self.on_sensor_changed(&values, now);
        }
    }

    fn handle_sample(&mut self, event: &[&str]) {
        if self.use_clock(Clock::Wall) {
            let values = parse_values(event);
            self.on_sensor_changed(&values, now_millis());
        }
    }

    fn handle_json(&mut self, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                debug!(%err, "unreadable sample");
                return;
            }
        };

        if let Some(batch) = value["samples"].as_array() {
            let samples = batch
                .iter()
                .filter_map(|entry| {
                    let (now, values) = self.json_sample(entry)?;
                    AccelerationSample::from_values(&values).map(|sample| (now, sample))
                })
                .collect::<Vec<_>>();
            self.on_sensor_batch(samples);
            return;
        }

        if let Some((now, values)) = self.json_sample(&value) {
            self.on_sensor_changed(&values, now);
        }
    }

    /// Pulls the timestamp and raw values out of one JSON sample. A missing
    /// `t` means the wall clock; a `t` that isn't a whole number of ms drops
    /// the sample.
    fn json_sample(&mut self, value: &Value) -> Option<(u64, Vec<f32>)> {
        let Some(values) = value["values"].as_array() else {
            debug!(%value, "sample without values");
            return None;
        };
        let values = values
            .iter()
            .map(|v| v.as_f64().map_or(f32::NAN, |v| v as f32))
            .collect::<Vec<_>>();

        let t = &value["t"];
        if t.is_null() {
            return self.use_clock(Clock::Wall).then(|| (now_millis(), values));
        }
        match parse_stamp(t) {
            Some(now) if self.use_clock(Clock::Feed) => Some((now, values)),
            Some(_) => None,
            None => {
                debug!(%t, "bad timestamp");
                None
            }
        }
    }

    /// Pins the feed to the first clock it uses. Samples timed by the other
    /// clock are dropped, since mixing them would debounce the rest forever.
    fn use_clock(&mut self, clock: Clock) -> bool {
        match self.clock {
            Some(current) if current != clock => {
                debug!(?clock, ?current, "sample from another clock dropped");
                false
            }
            _ => {
                self.clock = Some(clock);
                true
            }
        }
    }

    /// Sensor callback. Returns the throw a shake caused, if any.
    pub fn on_sensor_changed(&mut self, values: &[f32], now: u64) -> Option<Throw> {
        if !self.listening {
            return None;
        }
        let shake = self.detector.process_values(values, now)?;
        self.on_shake(shake)
    }

    /// Runs a batch of samples through the detector and throws once per shake.
    pub fn on_sensor_batch(&mut self, samples: Vec<(u64, AccelerationSample)>) -> Vec<Throw> {
        if !self.listening {
            return Vec::new();
        }
        let shakes = self.detector.events(samples).collect::<Vec<_>>();
        shakes
            .into_iter()
            .filter_map(|shake| self.on_shake(shake))
            .collect()
    }

    fn on_shake(&mut self, shake: ShakeEvent) -> Option<Throw> {
        if self.tracker.is_finished() {
            debug!(count = shake.count, at = shake.timestamp, "game over, shake ignored");
            return None;
        }
        Some(self.throw_dice())
    }

    fn throw_dice(&mut self) -> Throw {
        let throw = self.tracker.throw(&mut self.rng);
        debug!(current = throw.current.id(), history = ?throw.history, "display");
        println!("{}", self.build_table());
        if throw.won {
            self.finish_game(throw.current);
        }
        throw
    }

    fn finish_game(&mut self, face: Face) {
        self.dialog = Dialog::Won(face);
        println!("{}", self.build_dialog());
    }

    /// Registers for sensor samples again
    pub fn resume(&mut self) {
        info!("sensor resumed");
        self.listening = true;
    }

    /// Stops listening for sensor samples
    pub fn pause(&mut self) {
        info!("sensor paused");
        self.listening = false;
    }

    /// Starts over with a fresh game. Sensor registration is left alone.
    pub fn replay(&mut self) {
        info!("replay");
        self.detector = ShakeDetector::new();
        self.tracker = DiceTracker::new();
        self.dialog = Dialog::Hidden;
        self.replay_visible = false;
    }

    pub fn dismiss(&mut self) {
        if self.dialog != Dialog::Hidden {
            self.dialog = Dialog::Hidden;
            self.replay_visible = true;
        }
    }

    pub fn build_table(&self) -> String {
        let mut table = format!(
            "{:<8} | {:<6} | {:<6} | {:<6}\n",
            "Current", "Last", "2 ago", "3 ago"
        );
        let color = if self.tracker.is_finished() { "green" } else { "" };
        let current = self
            .tracker
            .current()
            .map_or_else(|| "-".to_owned(), |face| face.to_string());
        table.push_str(&format_str(format!("{:<8}", current), color));

        let history = self.tracker.history().faces();
        for i in 0..crate::dice_tracker::HISTORY_LEN {
            let slot = history
                .get(i)
                .map_or_else(|| "-".to_owned(), |face| face.to_string());
            let slot_color = if i == 0 { color } else { "" };
            table.push_str(" | ");
            table.push_str(&format_str(format!("{:<6}", slot), slot_color));
        }
        table.push('\n');
        table
    }

    fn build_dialog(&self) -> String {
        match self.dialog {
            Dialog::Won(face) => format!(
                "You won! {}  {}\n[replay] play again  [dismiss] close",
                format_str(face.to_string(), "green"),
                format_str(face.to_string(), "green"),
            ),
            Dialog::Hidden => String::new(),
        }
    }

    /// Per face roll counts for this game
    fn build_stats(&self) -> String {
        let rolls: &EnumMap<Face, u32> = self.tracker.rolls();
        let total = self.tracker.total_rolls();
        let mut table = format!("{:<6} | {:<6} | {:<6}\n", "Face", "Rolls", "Share");
        for (face, count) in rolls {
            let share = if total == 0 {
                0.0
            } else {
                100.0 * *count as f64 / total as f64
            };
            table.push_str(&format!("{:<6} | {:<6} | {:>5.1}%\n", face, count, share));
        }
        table.push_str(&format!("{:<6} | {:<6}\n", "Total", total));
        table
    }

    /// Snapshot of the session as JSON
    pub fn state(&self) -> Value {
        let ids = |faces: &[Face]| faces.iter().map(|f| f.id()).collect::<Vec<_>>();
        let dialog = match self.dialog {
            Dialog::Won(face) => Some(face.id()),
            Dialog::Hidden => None,
        };
        let status = match self.tracker.status() {
            GameStatus::Playing => "playing",
            GameStatus::Finished => "finished",
        };
        json!({
            "current": self.tracker.current().map(Face::id),
            "history": ids(self.tracker.history().faces()),
            "status": status,
            "shakes": self.detector.count(),
            "last_shake": self.detector.last_shake(),
            "listening": self.listening,
            "dialog": dialog,
        })
    }

    /// Parses a command received on cli
    pub fn parse_command(&mut self, command: &str) {
        let mut parts = command.split_whitespace();
        let op = match parts.next() {
            Some(op) => op,
            None => return,
        };

        match op {
            "replay" => {
                self.replay();
                println!("{}", self.build_table());
            }
            "dismiss" => {
                self.dismiss();
                if self.replay_visible {
                    println!("[replay] play again");
                }
            }
            "pause" => self.pause(),
            "resume" => self.resume(),
            "history" => println!("{}", self.build_table()),
            "stats" => println!("{}", self.build_stats()),
            "state" => println!("{}", self.state()),
            _ => {
                warn!(command, "unknown input");
                println!("Unknown command: {}", command);
            }
        }
    }
}

/// Accepts whole, non-negative ms, written either as an integer or a float
fn parse_stamp(t: &Value) -> Option<u64> {
    if let Some(t) = t.as_u64() {
        return Some(t);
    }
    let t = t.as_f64()?;
    if t.is_finite() && t >= 0.0 && t.fract() == 0.0 && t < u64::MAX as f64 {
        Some(t as u64)
    } else {
        None
    }
}

/// Unparseable components become NaN so the detector drops the sample
fn parse_values(raw: &[&str]) -> Vec<f32> {
    raw.iter()
        .map(|s| s.parse::<f32>().unwrap_or(f32::NAN))
        .collect()
}
