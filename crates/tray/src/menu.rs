//! Menu model for the tray.
//!
//! Each connected device owns a section of named slots. A slot carries a
//! label and a visibility flag; the tray backend renders the visible ones.

use std::collections::BTreeMap;

use crate::sink::IndicatorStatus;
use crate::tray::TrayUpdate;

/// Named display slots of a device section, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Info,
    Battery,
    Storage,
    Meid,
    Imei,
    Color,
    Msisdn,
    IsActivated,
    IsPasswd,
}

impl Slot {
    /// Every slot, in menu order.
    pub const ALL: [Slot; 9] = [
        Slot::Info,
        Slot::Battery,
        Slot::Storage,
        Slot::Meid,
        Slot::Imei,
        Slot::Color,
        Slot::Msisdn,
        Slot::IsActivated,
        Slot::IsPasswd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Slot::Info => "info",
            Slot::Battery => "battery",
            Slot::Storage => "storage",
            Slot::Meid => "meid",
            Slot::Imei => "imei",
            Slot::Color => "color",
            Slot::Msisdn => "msisdn",
            Slot::IsActivated => "is_activated",
            Slot::IsPasswd => "is_passwd",
        }
    }
}

/// Label and visibility of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotState {
    pub text: String,
    pub visible: bool,
}

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// User requested to quit the application.
    Quit,
}

/// A single menu item.
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Optional action triggered on click.
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: false,
            action: None,
        }
    }

    // Separator (represented as disabled empty item).
    fn separator() -> Self {
        Self::text(String::new())
    }
}

/// Current state used to build the context menu.
#[derive(Debug, Clone)]
pub struct MenuState {
    /// Application display name.
    pub app_name: String,
    /// Tray icon status.
    pub indicator: IndicatorStatus,
    /// Per-device sections. A section is dropped once none of its slots is
    /// visible, so disconnected devices do not accumulate.
    devices: BTreeMap<String, BTreeMap<Slot, SlotState>>,
}

impl Default for MenuState {
    fn default() -> Self {
        Self::new("idevtray")
    }
}

impl MenuState {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            indicator: IndicatorStatus::Passive,
            devices: BTreeMap::new(),
        }
    }

    /// Returns the state of `slot` for `device_id`, if it was ever touched.
    pub fn slot(&self, device_id: &str, slot: Slot) -> Option<&SlotState> {
        self.devices.get(device_id)?.get(&slot)
    }

    /// Returns `true` if `slot` of `device_id` is currently shown.
    pub fn is_visible(&self, device_id: &str, slot: Slot) -> bool {
        self.slot(device_id, slot).is_some_and(|s| s.visible)
    }

    /// Returns `true` if any slot of `device_id` is shown.
    pub fn has_visible_slots(&self, device_id: &str) -> bool {
        self.devices
            .get(device_id)
            .is_some_and(|slots| slots.values().any(|s| s.visible))
    }

    fn slot_mut(&mut self, device_id: &str, slot: Slot) -> &mut SlotState {
        self.devices
            .entry(device_id.to_string())
            .or_default()
            .entry(slot)
            .or_insert_with(|| SlotState {
                text: slot.name().to_string(),
                visible: false,
            })
    }

    /// Applies one update. Returns `true` if the rendered menu changed.
    ///
    /// Repeating an update is a no-op, so publishers may resend freely.
    pub fn apply(&mut self, update: &TrayUpdate) -> bool {
        match update {
            TrayUpdate::SetText {
                device_id,
                slot,
                text,
            } => {
                let state = self.slot_mut(device_id, *slot);
                if state.text == *text {
                    return false;
                }
                state.text.clone_from(text);
                state.visible
            }
            TrayUpdate::Show { device_id, slot } => {
                let state = self.slot_mut(device_id, *slot);
                !std::mem::replace(&mut state.visible, true)
            }
            TrayUpdate::Hide { device_id, slot } => {
                // Hiding never creates a section.
                let Some(slots) = self.devices.get_mut(device_id.as_str()) else {
                    return false;
                };
                let changed = slots
                    .get_mut(slot)
                    .is_some_and(|state| std::mem::replace(&mut state.visible, false));
                if !slots.values().any(|s| s.visible) {
                    self.devices.remove(device_id.as_str());
                }
                changed
            }
            TrayUpdate::Indicator(status) => {
                std::mem::replace(&mut self.indicator, *status) != *status
            }
            TrayUpdate::Shutdown => false,
        }
    }

    /// Builds the menu items from the current state.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let mut items = Vec::new();

        let mut any_device = false;
        for slots in self.devices.values() {
            if !slots.values().any(|s| s.visible) {
                continue;
            }
            any_device = true;

            if let Some(info) = slots.get(&Slot::Info).filter(|s| s.visible) {
                items.push(MenuItem {
                    label: info.text.clone(),
                    enabled: true,
                    action: None,
                });
            }
            items.push(MenuItem::separator());

            for (slot, state) in slots {
                if *slot != Slot::Info && state.visible {
                    items.push(MenuItem::text(state.text.clone()));
                }
            }
            items.push(MenuItem::separator());
        }

        if !any_device {
            items.push(MenuItem::text("No device connected"));
            items.push(MenuItem::separator());
        }

        // Quit.
        items.push(MenuItem {
            label: "Quit".into(),
            enabled: true,
            action: Some(MenuAction::Quit),
        });

        items
    }
}
