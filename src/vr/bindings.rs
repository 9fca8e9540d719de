//! Controller action and binding tables.
//!
//! Pure configuration: one action per physical control, and per interaction
//! profile the device paths each action is suggested for. Loaded once when a
//! runtime attaches its action set; nothing here runs per frame.

use crate::vr::Hand;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    Boolean,
    Float,
    Vector2,
    Pose,
    Vibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Control {
    Trigger,
    Grip,
    Joystick,
    Home,
    Back,
    Side,
    Touchpad,
    Quit,
    A,
    B,
    X,
    Y,
    ATouch,
    BTouch,
    XTouch,
    YTouch,
    TriggerTouch,
    JoystickTouch,
    ThumbrestTouch,
    GripPose,
    AimPose,
    Vibrate,
}

impl Control {
    pub const ALL: [Control; 22] = [
        Control::Trigger,
        Control::Grip,
        Control::Joystick,
        Control::Home,
        Control::Back,
        Control::Side,
        Control::Touchpad,
        Control::Quit,
        Control::A,
        Control::B,
        Control::X,
        Control::Y,
        Control::ATouch,
        Control::BTouch,
        Control::XTouch,
        Control::YTouch,
        Control::TriggerTouch,
        Control::JoystickTouch,
        Control::ThumbrestTouch,
        Control::GripPose,
        Control::AimPose,
        Control::Vibrate,
    ];

    pub fn kind(self) -> ActionKind {
        match self {
            Control::Trigger | Control::Grip => ActionKind::Float,
            Control::Joystick => ActionKind::Vector2,
            Control::GripPose | Control::AimPose => ActionKind::Pose,
            Control::Vibrate => ActionKind::Vibration,
            _ => ActionKind::Boolean,
        }
    }

    /// Runtime action name; lowercase, no spaces.
    pub fn action_name(self) -> &'static str {
        match self {
            Control::Trigger => "trigger",
            Control::Grip => "grip_value",
            Control::Joystick => "joystick",
            Control::Home => "home_key",
            Control::Back => "back_key",
            Control::Side => "side_key",
            Control::Touchpad => "touchpad",
            Control::Quit => "quit_session",
            Control::A => "a_key",
            Control::B => "b_key",
            Control::X => "x_key",
            Control::Y => "y_key",
            Control::ATouch => "a_touch",
            Control::BTouch => "b_touch",
            Control::XTouch => "x_touch",
            Control::YTouch => "y_touch",
            Control::TriggerTouch => "trigger_touch",
            Control::JoystickTouch => "joystick_touch",
            Control::ThumbrestTouch => "thumbrest_touch",
            Control::GripPose => "hand_pose",
            Control::AimPose => "aim_pose",
            Control::Vibrate => "vibrate_hand",
        }
    }

    pub fn localized_name(self) -> &'static str {
        match self {
            Control::Trigger => "Trigger",
            Control::Grip => "Grip",
            Control::Joystick => "Joystick",
            Control::Home => "Home Key",
            Control::Back => "Back Key",
            Control::Side => "Side Key",
            Control::Touchpad => "Touchpad",
            Control::Quit => "Quit Session",
            Control::A => "A Key",
            Control::B => "B Key",
            Control::X => "X Key",
            Control::Y => "Y Key",
            Control::ATouch => "A Touch",
            Control::BTouch => "B Touch",
            Control::XTouch => "X Touch",
            Control::YTouch => "Y Touch",
            Control::TriggerTouch => "Trigger Touch",
            Control::JoystickTouch => "Joystick Touch",
            Control::ThumbrestTouch => "Thumbrest Touch",
            Control::GripPose => "Hand Pose",
            Control::AimPose => "Aim Pose",
            Control::Vibrate => "Vibrate Hand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub control: Control,
    pub path: &'static str,
}

impl Binding {
    const fn new(control: Control, path: &'static str) -> Self {
        Self { control, path }
    }

    pub fn hand(&self) -> Option<Hand> {
        Hand::BOTH
            .into_iter()
            .find(|hand| self.path.starts_with(hand.user_path()))
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BindingProfile {
    pub interaction_profile: &'static str,
    pub bindings: &'static [Binding],
}

impl BindingProfile {
    pub fn bindings_for(&self, control: Control) -> impl Iterator<Item = &Binding> + '_ {
        self.bindings
            .iter()
            .filter(move |binding| binding.control == control)
    }
}

const KHR_SIMPLE: &[Binding] = &[
    Binding::new(Control::Grip, "/user/hand/left/input/select/click"),
    Binding::new(Control::Grip, "/user/hand/right/input/select/click"),
    Binding::new(Control::GripPose, "/user/hand/left/input/grip/pose"),
    Binding::new(Control::GripPose, "/user/hand/right/input/grip/pose"),
    Binding::new(Control::AimPose, "/user/hand/left/input/aim/pose"),
    Binding::new(Control::AimPose, "/user/hand/right/input/aim/pose"),
    Binding::new(Control::Quit, "/user/hand/left/input/menu/click"),
    Binding::new(Control::Quit, "/user/hand/right/input/menu/click"),
    Binding::new(Control::Vibrate, "/user/hand/left/output/haptic"),
    Binding::new(Control::Vibrate, "/user/hand/right/output/haptic"),
];

const OCULUS_TOUCH: &[Binding] = &[
    Binding::new(Control::Grip, "/user/hand/left/input/squeeze/value"),
    Binding::new(Control::Grip, "/user/hand/right/input/squeeze/value"),
    Binding::new(Control::GripPose, "/user/hand/left/input/grip/pose"),
    Binding::new(Control::GripPose, "/user/hand/right/input/grip/pose"),
    Binding::new(Control::AimPose, "/user/hand/left/input/aim/pose"),
    Binding::new(Control::AimPose, "/user/hand/right/input/aim/pose"),
    Binding::new(Control::Quit, "/user/hand/left/input/menu/click"),
    Binding::new(Control::Vibrate, "/user/hand/left/output/haptic"),
    Binding::new(Control::Vibrate, "/user/hand/right/output/haptic"),
];

const HTC_VIVE: &[Binding] = &[
    Binding::new(Control::Grip, "/user/hand/left/input/squeeze/click"),
    Binding::new(Control::Grip, "/user/hand/right/input/squeeze/click"),
    Binding::new(Control::GripPose, "/user/hand/left/input/grip/pose"),
    Binding::new(Control::GripPose, "/user/hand/right/input/grip/pose"),
    Binding::new(Control::AimPose, "/user/hand/left/input/aim/pose"),
    Binding::new(Control::AimPose, "/user/hand/right/input/aim/pose"),
    Binding::new(Control::Quit, "/user/hand/left/input/menu/click"),
    Binding::new(Control::Quit, "/user/hand/right/input/menu/click"),
    Binding::new(Control::Vibrate, "/user/hand/left/output/haptic"),
    Binding::new(Control::Vibrate, "/user/hand/right/output/haptic"),
];

const MICROSOFT_MOTION: &[Binding] = &[
    Binding::new(Control::Grip, "/user/hand/left/input/squeeze/click"),
    Binding::new(Control::Grip, "/user/hand/right/input/squeeze/click"),
    Binding::new(Control::GripPose, "/user/hand/left/input/grip/pose"),
    Binding::new(Control::GripPose, "/user/hand/right/input/grip/pose"),
    Binding::new(Control::AimPose, "/user/hand/left/input/aim/pose"),
    Binding::new(Control::AimPose, "/user/hand/right/input/aim/pose"),
    Binding::new(Control::Quit, "/user/hand/left/input/menu/click"),
    Binding::new(Control::Quit, "/user/hand/right/input/menu/click"),
    Binding::new(Control::Vibrate, "/user/hand/left/output/haptic"),
    Binding::new(Control::Vibrate, "/user/hand/right/output/haptic"),
];

const PICO_NEO3: &[Binding] = &[
    Binding::new(Control::Touchpad, "/user/hand/left/input/thumbstick/click"),
    Binding::new(Control::Touchpad, "/user/hand/right/input/thumbstick/click"),
    Binding::new(Control::Joystick, "/user/hand/left/input/thumbstick"),
    Binding::new(Control::Joystick, "/user/hand/right/input/thumbstick"),
    Binding::new(Control::JoystickTouch, "/user/hand/left/input/thumbstick/touch"),
    Binding::new(Control::JoystickTouch, "/user/hand/right/input/thumbstick/touch"),
    Binding::new(Control::Trigger, "/user/hand/left/input/trigger/value"),
    Binding::new(Control::Trigger, "/user/hand/right/input/trigger/value"),
    Binding::new(Control::TriggerTouch, "/user/hand/left/input/trigger/touch"),
    Binding::new(Control::TriggerTouch, "/user/hand/right/input/trigger/touch"),
    Binding::new(Control::Side, "/user/hand/left/input/squeeze/click"),
    Binding::new(Control::Side, "/user/hand/right/input/squeeze/click"),
    Binding::new(Control::Grip, "/user/hand/left/input/squeeze/value"),
    Binding::new(Control::Grip, "/user/hand/right/input/squeeze/value"),
    Binding::new(Control::GripPose, "/user/hand/left/input/grip/pose"),
    Binding::new(Control::GripPose, "/user/hand/right/input/grip/pose"),
    Binding::new(Control::Home, "/user/hand/left/input/system/click"),
    Binding::new(Control::Home, "/user/hand/right/input/system/click"),
    Binding::new(Control::Back, "/user/hand/left/input/back/click"),
    Binding::new(Control::Back, "/user/hand/right/input/back/click"),
    Binding::new(Control::ThumbrestTouch, "/user/hand/left/input/thumbrest/touch"),
    Binding::new(Control::ThumbrestTouch, "/user/hand/right/input/thumbrest/touch"),
    Binding::new(Control::XTouch, "/user/hand/left/input/x/touch"),
    Binding::new(Control::YTouch, "/user/hand/left/input/y/touch"),
    Binding::new(Control::ATouch, "/user/hand/right/input/a/touch"),
    Binding::new(Control::BTouch, "/user/hand/right/input/b/touch"),
    Binding::new(Control::X, "/user/hand/left/input/x/click"),
    Binding::new(Control::Y, "/user/hand/left/input/y/click"),
    Binding::new(Control::A, "/user/hand/right/input/a/click"),
    Binding::new(Control::B, "/user/hand/right/input/b/click"),
    Binding::new(Control::AimPose, "/user/hand/left/input/aim/pose"),
    Binding::new(Control::AimPose, "/user/hand/right/input/aim/pose"),
    Binding::new(Control::Vibrate, "/user/hand/left/output/haptic"),
    Binding::new(Control::Vibrate, "/user/hand/right/output/haptic"),
];

pub static BINDING_PROFILES: &[BindingProfile] = &[
    BindingProfile {
        interaction_profile: "/interaction_profiles/khr/simple_controller",
        bindings: KHR_SIMPLE,
    },
    BindingProfile {
        interaction_profile: "/interaction_profiles/oculus/touch_controller",
        bindings: OCULUS_TOUCH,
    },
    BindingProfile {
        interaction_profile: "/interaction_profiles/htc/vive_controller",
        bindings: HTC_VIVE,
    },
    BindingProfile {
        interaction_profile: "/interaction_profiles/microsoft/motion_controller",
        bindings: MICROSOFT_MOTION,
    },
    BindingProfile {
        interaction_profile: "/interaction_profiles/pico/neo3_controller",
        bindings: PICO_NEO3,
    },
];

pub fn profile(interaction_profile: &str) -> Option<&'static BindingProfile> {
    BINDING_PROFILES
        .iter()
        .find(|profile| profile.interaction_profile == interaction_profile)
}

/// Logs the device inputs behind each action for the active profile.
/// Returns how many controls have at least one binding, or `None` for a
/// profile with no suggested bindings.
pub fn log_binding_summary(interaction_profile: &str) -> Option<usize> {
    let profile = profile(interaction_profile)?;
    let mut bound = 0;
    for control in Control::ALL {
        let paths: Vec<&str> = profile
            .bindings_for(control)
            .map(|binding| binding.path)
            .collect();
        if paths.is_empty() {
            continue;
        }
        bound += 1;
        log::debug!(
            "[bindings] {} -> {}",
            control.localized_name(),
            paths.join(", ")
        );
    }
    Some(bound)
}
