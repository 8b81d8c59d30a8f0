//! Event definition table
//!
//! Maps event ids to their display template, the typedefs bound to the
//! record's operands and the labels shown in the detail listing.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Display definition of one event id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventDefinition {
    pub id: u16,
    /// Format template, e.g. `"Thread %x[val1] state=%E[val2, State:kind]"`
    #[serde(rename = "value", default)]
    pub template: String,
    /// Operand name (`val1`..`val4`) → typedef name
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
    /// Component label (brief name of the event's component)
    #[serde(default)]
    pub component: String,
    /// Event property label
    #[serde(default)]
    pub property: String,
    /// Level such as `Error`, `API`, `Op` or `Detail`
    #[serde(default)]
    pub level: Option<String>,
}

impl EventDefinition {
    pub fn new(id: u16, template: impl Into<String>) -> Self {
        Self {
            id,
            template: template.into(),
            bindings: BTreeMap::new(),
            component: String::new(),
            property: String::new(),
            level: None,
        }
    }

    /// Builder method: set component and property labels
    pub fn with_labels(mut self, component: impl Into<String>, property: impl Into<String>) -> Self {
        self.component = component.into();
        self.property = property.into();
        self
    }

    /// Builder method: bind an operand to a typedef
    pub fn with_binding(mut self, operand: impl Into<String>, typedef: impl Into<String>) -> Self {
        self.bindings.insert(operand.into(), typedef.into());
        self
    }

    /// Builder method: set the level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Typedef bound to `operand`, if any
    pub fn binding(&self, operand: &str) -> Option<&str> {
        self.bindings.get(operand).map(String::as_str)
    }
}

/// All event definitions of the loaded schema set
#[derive(Debug, Clone, Default)]
pub struct EventDefinitionTable {
    events: HashMap<u16, EventDefinition>,
}

impl EventDefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition; a later definition of the same id replaces the earlier one
    pub fn add_event(&mut self, event: EventDefinition) {
        if self.events.insert(event.id, event).is_some() {
            log::debug!("Event definition replaced by a later schema");
        }
    }

    pub fn get(&self, id: u16) -> Option<&EventDefinition> {
        self.events.get(&id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Longest component and property labels across all definitions, in characters
    pub fn label_widths(&self) -> (usize, usize) {
        self.events.values().fold((0, 0), |(component, property), event| {
            (
                component.max(event.component.chars().count()),
                property.max(event.property.chars().count()),
            )
        })
    }
}

impl FromIterator<EventDefinition> for EventDefinitionTable {
    fn from_iter<I: IntoIterator<Item = EventDefinition>>(iter: I) -> Self {
        let mut table = EventDefinitionTable::new();
        for event in iter {
            table.add_event(event);
        }
        table
    }
}
