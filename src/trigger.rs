//! Trigger inputs and outputs of a device (the EXT connectors).

use crate::error::Result;
use crate::registry::Domain;
use crate::sdk::{Action, BoolProperty, IntProperty, StringProperty};
use crate::session::DeviceSession;

/// A trigger input, borrowed from its session.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInput<'a> {
    session: &'a DeviceSession,
    index: u16,
}

impl<'a> TriggerInput<'a> {
    pub(crate) fn new(session: &'a DeviceSession, index: u16) -> Self {
        Self { session, index }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn is_available(&self) -> Result<bool> {
        self.session
            .get_bool(BoolProperty::TrInIsAvailable(self.index))
    }

    /// Label of the input, e.g. "EXT 1".
    pub fn id(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::TrInId(self.index), Domain::TriggerId)
    }

    pub fn name(&self) -> Result<String> {
        self.session
            .get_string(StringProperty::TrInName(self.index))
    }

    pub fn kinds(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::TrInKinds(self.index), Domain::TriggerKind)
    }

    pub fn kind(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::TrInKind(self.index), Domain::TriggerKind)
    }

    pub fn set_kind(&self, kind: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::TrInKind(self.index), Domain::TriggerKind, kind)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::TrInEnabled(self.index))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::TrInEnabled(self.index), enabled)
    }
}

/// A trigger output, borrowed from its session.
#[derive(Debug, Clone, Copy)]
pub struct TriggerOutput<'a> {
    session: &'a DeviceSession,
    index: u16,
}

impl<'a> TriggerOutput<'a> {
    pub(crate) fn new(session: &'a DeviceSession, index: u16) -> Self {
        Self { session, index }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn id(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::TrOutId(self.index), Domain::TriggerId)
    }

    pub fn name(&self) -> Result<String> {
        self.session
            .get_string(StringProperty::TrOutName(self.index))
    }

    pub fn is_enabled(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::TrOutEnabled(self.index))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::TrOutEnabled(self.index), enabled)
    }

    /// Events this output can be driven by.
    pub fn events(&self) -> Result<Vec<&'static str>> {
        self.session.get_labels(
            IntProperty::TrOutEvents(self.index),
            Domain::TriggerOutputEvent,
        )
    }

    pub fn event(&self) -> Result<&'static str> {
        self.session.get_label(
            IntProperty::TrOutEvent(self.index),
            Domain::TriggerOutputEvent,
        )
    }

    pub fn set_event(&self, event: &str) -> Result<&'static str> {
        self.session.set_label(
            IntProperty::TrOutEvent(self.index),
            Domain::TriggerOutputEvent,
            event,
        )
    }

    /// Pulse the output once, regardless of the configured event.
    pub fn trigger(&self) -> Result<bool> {
        self.session.action(Action::TrOutTrigger(self.index))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::error::HandyscopeError;
    use crate::locator::DeviceLocator;
    use crate::oscilloscope::Oscilloscope;
    use crate::sdk::simulated::{SimulatedDevice, SimulatedSdk};
    use crate::status::StatusCode;

    fn scope() -> (Arc<SimulatedSdk>, Oscilloscope) {
        let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope(
            "Handyscope HS5-540XMS",
            1,
        )]));
        let scope = Oscilloscope::open(&DeviceLocator::new(sdk.clone()), "HS5").unwrap();
        (sdk, scope)
    }

    #[test]
    fn test_trigger_input_ids() {
        let (_sdk, scope) = scope();
        let ids: Vec<_> = scope
            .session()
            .trigger_inputs()
            .unwrap()
            .iter()
            .map(|input| input.id().unwrap())
            .collect();
        assert_eq!(ids, vec!["EXT 1", "EXT 2", "EXT 3"]);
    }

    #[test]
    fn test_trigger_input_kind() {
        let (_sdk, scope) = scope();
        let input = scope.session().trigger_input(0).unwrap();
        assert_eq!(input.kinds().unwrap(), vec!["rising", "falling"]);
        assert_eq!(input.set_kind("falling").unwrap(), "falling");
        assert_eq!(input.kind().unwrap(), "falling");
        assert!(input.set_enabled(true).unwrap());
        assert!(input.is_enabled().unwrap());
        assert_eq!(input.name().unwrap(), "EXT 1");
    }

    #[test]
    fn test_trigger_input_unsupported_kind() {
        let (_sdk, scope) = scope();
        let input = scope.session().trigger_input(1).unwrap();
        match input.set_kind("in window") {
            Err(HandyscopeError::NativeCall { status, .. }) => {
                assert_eq!(status, StatusCode::NOT_SUPPORTED);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_trigger_output_event() {
        let (_sdk, scope) = scope();
        let output = scope.session().trigger_output(2).unwrap();
        assert_eq!(output.id().unwrap(), "EXT 3");
        assert_eq!(output.events().unwrap().len(), 6);
        assert_eq!(output.set_event("manual").unwrap(), "manual");
        assert_eq!(output.event().unwrap(), "manual");
        assert!(output.trigger().unwrap());
    }
}
