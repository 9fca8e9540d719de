use crate::vr::bindings::Control;
use crate::vr::runtime::{ActionSource, Haptics, HapticVibration, SessionControl};
use crate::vr::{Hand, XrResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HAPTIC_THRESHOLD: f32 = 0.9;
const HAPTIC_AMPLITUDE: f32 = 0.5;

/// Button identities forwarded to the streaming service, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    System,
    A,
    B,
    X,
    Y,
    TriggerTouch,
}

impl Button {
    pub fn bit(self) -> u64 {
        let shift = match self {
            Button::System => 0,
            Button::A => 1,
            Button::B => 2,
            Button::X => 3,
            Button::Y => 4,
            Button::TriggerTouch => 5,
        };
        1 << shift
    }

    fn for_control(control: Control) -> Option<Button> {
        match control {
            Control::Home => Some(Button::System),
            Control::A => Some(Button::A),
            Control::B => Some(Button::B),
            Control::X => Some(Button::X),
            Control::Y => Some(Button::Y),
            Control::TriggerTouch => Some(Button::TriggerTouch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analog {
    Trigger,
    Grip,
    JoystickX,
    JoystickY,
}

impl Analog {
    pub fn index(self) -> usize {
        match self {
            Analog::Trigger => 0,
            Analog::Grip => 1,
            Analog::JoystickX => 2,
            Analog::JoystickY => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub buttons: u64,
    pub analog: [f32; 4],
}

impl ControllerSnapshot {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button.bit() != 0
    }

    pub fn analog(&self, axis: Analog) -> f32 {
        self.analog[axis.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub controllers: [ControllerSnapshot; 2],
}

impl TrackingSnapshot {
    pub fn controller(&self, hand: Hand) -> &ControllerSnapshot {
        &self.controllers[hand.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputReport {
    /// Back button was released this tick.
    pub exit_requested: bool,
    pub hand_active: [bool; 2],
    pub snapshot: TrackingSnapshot,
}

const BUTTON_CONTROLS: [Control; 6] = [
    Control::Home,
    Control::A,
    Control::B,
    Control::X,
    Control::Y,
    Control::TriggerTouch,
];

// Read and logged so binding problems show up, but not forwarded.
const OBSERVED_CONTROLS: [Control; 8] = [
    Control::Side,
    Control::Touchpad,
    Control::ATouch,
    Control::BTouch,
    Control::XTouch,
    Control::YTouch,
    Control::JoystickTouch,
    Control::ThumbrestTouch,
];

/// Turns synced action state into a [`TrackingSnapshot`] once per tick.
pub struct InputRelay {
    analog: [[f32; 4]; 2],
    haptic_threshold: f32,
}

impl InputRelay {
    pub fn new() -> Self {
        Self::with_haptic_threshold(DEFAULT_HAPTIC_THRESHOLD)
    }

    pub fn with_haptic_threshold(haptic_threshold: f32) -> Self {
        Self {
            analog: [[0.0; 4]; 2],
            haptic_threshold,
        }
    }

    pub fn poll<R>(&mut self, runtime: &mut R) -> XrResult<InputReport>
    where
        R: ActionSource + Haptics + SessionControl + ?Sized,
    {
        runtime.sync_actions()?;

        let mut report = InputReport::default();

        for hand in Hand::BOTH {
            let slot = hand.index();
            let mut controller = ControllerSnapshot {
                buttons: 0,
                analog: self.analog[slot],
            };

            let grip = runtime.float_state(Control::Grip, hand)?;
            if grip.is_active {
                controller.analog[Analog::Grip.index()] = grip.current_state;
                if grip.current_state > self.haptic_threshold {
                    runtime.apply_vibration(hand, HapticVibration::pulse(HAPTIC_AMPLITUDE))?;
                }
            }

            let trigger = runtime.float_state(Control::Trigger, hand)?;
            if trigger.is_active {
                controller.analog[Analog::Trigger.index()] = trigger.current_state;
            }

            let joystick = runtime.vector2_state(Control::Joystick, hand)?;
            if joystick.is_active {
                controller.analog[Analog::JoystickX.index()] = joystick.x;
                controller.analog[Analog::JoystickY.index()] = joystick.y;
            }

            if runtime.boolean_state(Control::Quit, hand)?.pressed_edge() {
                log::info!("[input] quit pressed on {} hand", hand.label());
                runtime.request_exit_session()?;
            }

            for control in BUTTON_CONTROLS {
                if runtime.boolean_state(control, hand)?.pressed_edge() {
                    if let Some(button) = Button::for_control(control) {
                        controller.buttons |= button.bit();
                    }
                }
            }

            if runtime.boolean_state(Control::Back, hand)?.released_edge() {
                log::info!("[input] back released on {} hand", hand.label());
                report.exit_requested = true;
            }

            for control in OBSERVED_CONTROLS {
                let state = runtime.boolean_state(control, hand)?;
                if state.pressed_edge() {
                    log::debug!(
                        "[input] {} pressed on {} hand",
                        control.localized_name(),
                        hand.label()
                    );
                }
            }

            report.hand_active[slot] = runtime.pose_active(hand)?;
            self.analog[slot] = controller.analog;
            report.snapshot.controllers[slot] = controller;
        }

        Ok(report)
    }
}

impl Default for InputRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::runtime::{BooleanState, FloatState, Vector2State};
    use crate::vr::session::SessionHandle;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct ScriptedActions {
        booleans: HashMap<(Control, Hand), BooleanState>,
        floats: HashMap<(Control, Hand), FloatState>,
        sticks: HashMap<Hand, Vector2State>,
        pose_active: [bool; 2],
        syncs: u32,
        exit_requests: u32,
        vibrations: Vec<(Hand, HapticVibration)>,
    }

    impl ScriptedActions {
        fn set_bool(&mut self, control: Control, hand: Hand, current: bool, changed: bool) {
            self.booleans.insert(
                (control, hand),
                BooleanState {
                    current_state: current,
                    changed_since_last_sync: changed,
                    is_active: true,
                },
            );
        }

        fn set_float(&mut self, control: Control, hand: Hand, value: f32, active: bool) {
            self.floats.insert(
                (control, hand),
                FloatState {
                    current_state: value,
                    is_active: active,
                },
            );
        }
    }

    impl ActionSource for ScriptedActions {
        fn sync_actions(&mut self) -> XrResult<()> {
            self.syncs += 1;
            Ok(())
        }

        fn boolean_state(&mut self, control: Control, hand: Hand) -> XrResult<BooleanState> {
            Ok(self.booleans.get(&(control, hand)).copied().unwrap_or_default())
        }

        fn float_state(&mut self, control: Control, hand: Hand) -> XrResult<FloatState> {
            Ok(self.floats.get(&(control, hand)).copied().unwrap_or_default())
        }

        fn vector2_state(&mut self, _control: Control, hand: Hand) -> XrResult<Vector2State> {
            Ok(self.sticks.get(&hand).copied().unwrap_or_default())
        }

        fn pose_active(&mut self, hand: Hand) -> XrResult<bool> {
            Ok(self.pose_active[hand.index()])
        }
    }

    impl Haptics for ScriptedActions {
        fn apply_vibration(&mut self, hand: Hand, vibration: HapticVibration) -> XrResult<()> {
            self.vibrations.push((hand, vibration));
            Ok(())
        }
    }

    impl SessionControl for ScriptedActions {
        fn session_handle(&self) -> SessionHandle {
            SessionHandle(1)
        }

        fn begin_session(&mut self) -> XrResult<()> {
            Ok(())
        }

        fn end_session(&mut self) -> XrResult<()> {
            Ok(())
        }

        fn request_exit_session(&mut self) -> XrResult<()> {
            self.exit_requests += 1;
            Ok(())
        }
    }

    #[test]
    fn rising_edges_set_button_bits() {
        let mut actions = ScriptedActions::default();
        actions.set_bool(Control::A, Hand::Right, true, true);
        actions.set_bool(Control::Home, Hand::Left, true, true);
        // held but not changed: no bit
        actions.set_bool(Control::X, Hand::Left, true, false);

        let mut relay = InputRelay::new();
        let report = relay.poll(&mut actions).expect("poll");

        let left = report.snapshot.controller(Hand::Left);
        let right = report.snapshot.controller(Hand::Right);
        assert!(left.is_pressed(Button::System));
        assert!(!left.is_pressed(Button::X));
        assert!(right.is_pressed(Button::A));
        assert_eq!(actions.syncs, 1);
    }

    #[test]
    fn back_release_requests_exit_but_press_does_not() {
        let mut actions = ScriptedActions::default();
        actions.set_bool(Control::Back, Hand::Left, true, true);
        let mut relay = InputRelay::new();
        assert!(!relay.poll(&mut actions).expect("press").exit_requested);

        actions.set_bool(Control::Back, Hand::Left, true, false);
        assert!(!relay.poll(&mut actions).expect("hold").exit_requested);

        actions.set_bool(Control::Back, Hand::Left, false, true);
        assert!(relay.poll(&mut actions).expect("release").exit_requested);

        actions.set_bool(Control::Back, Hand::Left, false, false);
        assert!(!relay.poll(&mut actions).expect("idle").exit_requested);
    }

    #[test]
    fn quit_press_requests_session_exit_once() {
        let mut actions = ScriptedActions::default();
        actions.set_bool(Control::Quit, Hand::Right, true, true);
        let mut relay = InputRelay::new();
        relay.poll(&mut actions).expect("poll");
        actions.set_bool(Control::Quit, Hand::Right, true, false);
        relay.poll(&mut actions).expect("poll");
        assert_eq!(actions.exit_requests, 1);
    }

    #[test]
    fn inactive_analog_keeps_previous_value() {
        let mut actions = ScriptedActions::default();
        actions.set_float(Control::Trigger, Hand::Left, 0.4, true);
        let mut relay = InputRelay::new();
        let first = relay.poll(&mut actions).expect("poll");
        assert_eq!(first.snapshot.controller(Hand::Left).analog(Analog::Trigger), 0.4);

        actions.set_float(Control::Trigger, Hand::Left, 0.0, false);
        let second = relay.poll(&mut actions).expect("poll");
        assert_eq!(second.snapshot.controller(Hand::Left).analog(Analog::Trigger), 0.4);
    }

    #[test]
    fn joystick_and_pose_activity_are_reported() {
        let mut actions = ScriptedActions::default();
        actions.sticks.insert(
            Hand::Right,
            Vector2State {
                x: -0.5,
                y: 1.0,
                is_active: true,
            },
        );
        actions.pose_active = [false, true];
        let report = InputRelay::new().poll(&mut actions).expect("poll");
        let right = report.snapshot.controller(Hand::Right);
        assert_eq!(right.analog(Analog::JoystickX), -0.5);
        assert_eq!(right.analog(Analog::JoystickY), 1.0);
        assert_eq!(report.hand_active, [false, true]);
    }

    #[test]
    fn firm_grip_pulses_that_hand() {
        let mut actions = ScriptedActions::default();
        actions.set_float(Control::Grip, Hand::Left, 0.95, true);
        actions.set_float(Control::Grip, Hand::Right, 0.9, true);
        InputRelay::new().poll(&mut actions).expect("poll");
        assert_eq!(actions.vibrations.len(), 1);
        let (hand, vibration) = actions.vibrations[0];
        assert_eq!(hand, Hand::Left);
        assert_eq!(vibration.amplitude, 0.5);
        assert_eq!(vibration.duration, HapticVibration::MIN_DURATION);
    }

    proptest! {
        #[test]
        fn button_bit_set_only_on_rising_edge(
            current in any::<bool>(),
            changed in any::<bool>(),
            active in any::<bool>(),
        ) {
            let mut actions = ScriptedActions::default();
            actions.booleans.insert(
                (Control::B, Hand::Right),
                BooleanState {
                    current_state: current,
                    changed_since_last_sync: changed,
                    is_active: active,
                },
            );
            let report = InputRelay::new().poll(&mut actions).expect("poll");
            let pressed = report.snapshot.controller(Hand::Right).is_pressed(Button::B);
            prop_assert_eq!(pressed, current && changed && active);
        }
    }
}
