mod command_input;
mod field_picker;
mod input;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use field_picker::{FieldPicker, FieldPickerEvent};
pub use search_input::{SearchEvent, SearchInput};

/// Outcome of offering a key to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, no event for parent to handle
  Handled,
  /// Key was consumed, here's an event for parent to process
  Event(T),
  /// Key was not consumed, parent should try next handler
  NotHandled,
}
