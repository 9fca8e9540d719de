use crate::vr::runtime::{SpaceLocation, TrackedSpace, Tracking};
use crate::vr::{DisplayTime, Hand, PoseSample, Vector3, XrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedEntity {
    Head,
    Hand(Hand),
}

impl TrackedEntity {
    fn slot(self) -> usize {
        match self {
            TrackedEntity::Head => 0,
            TrackedEntity::Hand(hand) => 1 + hand.index(),
        }
    }

    fn space(self) -> TrackedSpace {
        match self {
            TrackedEntity::Head => TrackedSpace::Head,
            TrackedEntity::Hand(hand) => TrackedSpace::Aim(hand),
        }
    }

    fn label(self) -> &'static str {
        match self {
            TrackedEntity::Head => "head",
            TrackedEntity::Hand(Hand::Left) => "left hand",
            TrackedEntity::Hand(Hand::Right) => "right hand",
        }
    }
}

/// Samples head and aim poses and keeps the last fully valid one per entity.
pub struct PoseSampler {
    last_good: [Option<PoseSample>; 3],
    active: [bool; 3],
}

impl PoseSampler {
    pub fn new() -> Self {
        Self {
            last_good: [None; 3],
            // headsets are assumed tracked until told otherwise
            active: [true, false, false],
        }
    }

    pub fn set_hand_active(&mut self, hand: Hand, active: bool) {
        self.active[TrackedEntity::Hand(hand).slot()] = active;
    }

    pub fn is_active(&self, entity: TrackedEntity) -> bool {
        self.active[entity.slot()]
    }

    pub fn last_good(&self, entity: TrackedEntity) -> Option<&PoseSample> {
        self.last_good[entity.slot()].as_ref()
    }

    pub fn sample_head<T>(&mut self, tracking: &mut T, time: DisplayTime) -> XrResult<PoseSample>
    where
        T: Tracking + ?Sized,
    {
        self.sample(tracking, TrackedEntity::Head, time)
    }

    /// Known-good aim poses, left before right. A hand that has never been
    /// tracked is left out.
    pub fn sample_hands<T>(
        &mut self,
        tracking: &mut T,
        time: DisplayTime,
    ) -> XrResult<Vec<(Hand, PoseSample)>>
    where
        T: Tracking + ?Sized,
    {
        let mut hands = Vec::with_capacity(Hand::BOTH.len());
        for hand in Hand::BOTH {
            let entity = TrackedEntity::Hand(hand);
            self.sample(tracking, entity, time)?;
            if let Some(sample) = self.last_good(entity) {
                hands.push((hand, *sample));
            }
        }
        Ok(hands)
    }

    fn sample<T>(
        &mut self,
        tracking: &mut T,
        entity: TrackedEntity,
        time: DisplayTime,
    ) -> XrResult<PoseSample>
    where
        T: Tracking + ?Sized,
    {
        let location = tracking.locate_space(entity.space(), time)?;
        let slot = entity.slot();

        if location.validity.is_valid() {
            let sample = fresh_sample(&location, time);
            self.last_good[slot] = Some(sample);
            return Ok(sample);
        }

        if self.active[slot] {
            log::info!(
                "[sampler] {} pose unavailable at {time}, position={} orientation={}",
                entity.label(),
                location.validity.position,
                location.validity.orientation
            );
        }

        Ok(self.last_good[slot].unwrap_or_else(|| PoseSample::neutral(time)))
    }
}

impl Default for PoseSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_sample(location: &SpaceLocation, time: DisplayTime) -> PoseSample {
    PoseSample {
        pose: location.pose,
        linear_velocity: location.linear_velocity.unwrap_or(Vector3::ZERO),
        angular_velocity: location.angular_velocity.unwrap_or(Vector3::ZERO),
        time,
        validity: location.validity,
    }
}
