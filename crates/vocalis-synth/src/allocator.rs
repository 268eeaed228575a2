//! Fixed-pool voice allocation with priority-based stealing.
//!
//! Slots are created once and never destroyed; a LIFO free list hands them
//! out in O(1). When the pool is full the active slot with the lowest
//! priority is stolen, ties going to the youngest note and then to the
//! first slot in scan order.
//!
//! Priority (0-100) favours loud and long-held notes, with a random term
//! so that equal notes do not always steal the same slot:
//!
//! ```text
//! priority = velocity/127 * 50 + min(age, 100)/100 * 30 + U[0, jitter]
//! ```

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use vocalis_core::midi_to_freq;

use crate::error::SynthesisError;

/// Pool size used by [`VoiceAllocator::default`].
pub const DEFAULT_MAX_VOICES: usize = 60;

/// Upper bound of the random priority term.
pub const DEFAULT_PRIORITY_JITTER: f32 = 20.0;

/// Elapsed audio time between priority refreshes.
pub const PRIORITY_UPDATE_INTERVAL: f32 = 0.1;

const MAX_AGE: u32 = 100;
const DEFAULT_SEED: u64 = 0x766f_6361_6c69_73;

/// One entry in the voice pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSlot {
    /// Stable index of this slot.
    pub id: usize,
    /// MIDI note (0-127).
    pub note: u8,
    /// MIDI velocity (0-127).
    pub velocity: u8,
    /// In use.
    pub active: bool,
    /// Stealing priority (0-100).
    pub priority: u8,
    /// Priority refreshes survived, capped at 100.
    pub age: u32,
    /// Note frequency in Hz.
    pub frequency: f32,
    /// Velocity as amplitude (0-1).
    pub amplitude: f32,
    /// Stereo position (-1 left, 1 right).
    pub pan: f32,
}

impl VoiceSlot {
    fn new(id: usize) -> Self {
        Self {
            id,
            note: 0,
            velocity: 0,
            active: false,
            priority: 0,
            age: 0,
            frequency: 0.0,
            amplitude: 0.0,
            pan: 0.0,
        }
    }

    fn clear(&mut self) {
        *self = Self::new(self.id);
    }
}

/// Result of [`VoiceAllocator::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Slot now holding the note.
    pub slot_id: usize,
    /// True when an active voice was taken over.
    pub stolen: bool,
    /// Slot that was stolen, if any.
    pub stolen_from: Option<usize>,
}

/// Allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Successful allocations.
    pub total_allocations: u64,
    /// Allocations that stole an active voice.
    pub stolen_voices: u64,
    /// Steals whose victim had priority above 50.
    pub high_priority_steals: u64,
    /// Steals whose victim had priority 50 or less.
    pub low_priority_steals: u64,
}

/// Fixed pool of [`VoiceSlot`]s.
///
/// # Example
///
/// ```rust
/// use vocalis_synth::VoiceAllocator;
///
/// let mut allocator = VoiceAllocator::new(2);
/// let a = allocator.allocate(60, 100).unwrap();
/// let b = allocator.allocate(64, 100).unwrap();
/// let c = allocator.allocate(67, 20).unwrap();
///
/// assert!(!a.stolen && !b.stolen);
/// assert!(c.stolen);
/// assert_eq!(allocator.active_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    slots: Vec<VoiceSlot>,
    free: Vec<usize>,
    rng: Pcg32,
    jitter: f32,
    elapsed: f32,
    stats: AllocatorStats,
}

impl VoiceAllocator {
    /// Pool of `max_voices` slots (at least one).
    pub fn new(max_voices: usize) -> Self {
        Self::with_seed(max_voices, DEFAULT_SEED)
    }

    /// Pool with a fixed seed for the random priority term.
    pub fn with_seed(max_voices: usize, seed: u64) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            slots: (0..max_voices).map(VoiceSlot::new).collect(),
            // Reversed so that pops hand out slot 0 first.
            free: (0..max_voices).rev().collect(),
            rng: Pcg32::seed_from_u64(seed),
            jitter: DEFAULT_PRIORITY_JITTER,
            elapsed: 0.0,
            stats: AllocatorStats::default(),
        }
    }

    /// Assign a slot to `note`, stealing one if the pool is full.
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] when `note` or `velocity` is above
    /// 127. No state changes in that case.
    pub fn allocate(&mut self, note: u8, velocity: u8) -> Result<Allocation, SynthesisError> {
        self.assign(note, velocity, false)
    }

    /// Like [`allocate`](Self::allocate), but steal the lowest-priority
    /// active voice even when free slots remain. Used to shed load when the
    /// engine runs over its CPU limit. With nothing sounding, a free slot
    /// is used.
    ///
    /// ## Errors
    /// As [`allocate`](Self::allocate).
    pub fn allocate_stealing(&mut self, note: u8, velocity: u8) -> Result<Allocation, SynthesisError> {
        self.assign(note, velocity, true)
    }

    fn assign(&mut self, note: u8, velocity: u8, force_steal: bool) -> Result<Allocation, SynthesisError> {
        if note > 127 {
            return Err(SynthesisError::InvalidInput("note outside 0-127"));
        }
        if velocity > 127 {
            return Err(SynthesisError::InvalidInput("velocity outside 0-127"));
        }

        let free = if force_steal && self.active_count() > 0 {
            None
        } else {
            self.free.pop()
        };
        let (slot_id, stolen_from) = match free {
            Some(id) => (id, None),
            None => {
                let victim = self.find_victim();
                let priority = self.slots[victim].priority;
                self.stats.stolen_voices += 1;
                if priority > 50 {
                    self.stats.high_priority_steals += 1;
                } else {
                    self.stats.low_priority_steals += 1;
                }
                (victim, Some(victim))
            }
        };

        let jitter = self.random_term();
        let slot = &mut self.slots[slot_id];
        slot.clear();
        slot.note = note;
        slot.velocity = velocity;
        slot.active = true;
        slot.frequency = midi_to_freq(f32::from(note));
        slot.amplitude = f32::from(velocity) / 127.0;
        slot.priority = priority_for(velocity, 0, jitter);

        self.stats.total_allocations += 1;
        Ok(Allocation {
            slot_id,
            stolen: stolen_from.is_some(),
            stolen_from,
        })
    }

    /// Return a slot to the pool. Inactive or out-of-range ids are ignored.
    pub fn free(&mut self, slot_id: usize) {
        let Some(slot) = self.slots.get_mut(slot_id) else {
            return;
        };
        if !slot.active {
            return;
        }
        slot.clear();
        self.free.push(slot_id);
    }

    /// Age every active slot by one step and recompute its priority.
    pub fn update_priorities(&mut self) {
        for i in 0..self.slots.len() {
            if !self.slots[i].active {
                continue;
            }
            let jitter = self.random_term();
            let slot = &mut self.slots[i];
            slot.age = (slot.age + 1).min(MAX_AGE);
            slot.priority = priority_for(slot.velocity, slot.age, jitter);
        }
    }

    /// Advance by `seconds` of audio, refreshing priorities every
    /// [`PRIORITY_UPDATE_INTERVAL`].
    pub fn advance_time(&mut self, seconds: f32) {
        self.elapsed += seconds.max(0.0);
        while self.elapsed >= PRIORITY_UPDATE_INTERVAL {
            self.elapsed -= PRIORITY_UPDATE_INTERVAL;
            self.update_priorities();
        }
    }

    /// Free every slot.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.free.clear();
        self.free.extend((0..self.slots.len()).rev());
        self.elapsed = 0.0;
    }

    /// Upper bound of the random priority term (0-100).
    pub fn set_priority_jitter(&mut self, max: f32) {
        self.jitter = max.clamp(0.0, 100.0);
    }

    /// Set the stereo position of an active slot.
    pub fn set_pan(&mut self, slot_id: usize, pan: f32) {
        if let Some(slot) = self.slots.get_mut(slot_id).filter(|s| s.active) {
            slot.pan = pan.clamp(-1.0, 1.0);
        }
    }

    /// Counters.
    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    /// All slots in id order.
    pub fn slots(&self) -> &[VoiceSlot] {
        &self.slots
    }

    /// One slot.
    pub fn slot(&self, slot_id: usize) -> Option<&VoiceSlot> {
        self.slots.get(slot_id)
    }

    /// Number of active slots.
    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Pool size.
    pub fn max_voices(&self) -> usize {
        self.slots.len()
    }

    fn random_term(&mut self) -> f32 {
        if self.jitter > 0.0 {
            self.rng.r#gen::<f32>() * self.jitter
        } else {
            0.0
        }
    }

    fn find_victim(&self) -> usize {
        let mut victim = 0;
        let mut lowest = (u8::MAX, u32::MAX);
        for slot in self.slots.iter().filter(|s| s.active) {
            let key = (slot.priority, slot.age);
            if key < lowest {
                lowest = key;
                victim = slot.id;
            }
        }
        victim
    }
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VOICES)
    }
}

fn priority_for(velocity: u8, age: u32, jitter: f32) -> u8 {
    let velocity_score = f32::from(velocity) / 127.0 * 50.0;
    let age_score = age.min(MAX_AGE) as f32 / MAX_AGE as f32 * 30.0;
    (velocity_score + age_score + jitter).clamp(0.0, 100.0) as u8
}
