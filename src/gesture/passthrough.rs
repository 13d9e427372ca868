/// Decides whether the window should let pointer input fall through.
///
/// Hover, drag and an open modal dialog are tracked separately; input is only
/// ignored when none of them holds. Each setter returns the new value only
/// when it differs from what was last applied, so the host is never called
/// redundantly.
#[derive(Debug, Clone, Default)]
pub struct PointerPassthrough {
    hovering: bool,
    dragging: bool,
    modal_open: bool,
    applied: Option<bool>,
}

impl PointerPassthrough {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_ignore(&self) -> bool {
        !(self.hovering || self.dragging || self.modal_open)
    }

    pub fn set_hovering(&mut self, hovering: bool) -> Option<bool> {
        self.hovering = hovering;
        self.reconcile()
    }

    pub fn set_dragging(&mut self, dragging: bool) -> Option<bool> {
        self.dragging = dragging;
        self.reconcile()
    }

    pub fn set_modal_open(&mut self, modal_open: bool) -> Option<bool> {
        self.modal_open = modal_open;
        self.reconcile()
    }

    /// Value to apply right now, regardless of what was applied before.
    pub fn force(&mut self) -> bool {
        let ignore = self.should_ignore();
        self.applied = Some(ignore);
        ignore
    }

    fn reconcile(&mut self) -> Option<bool> {
        let ignore = self.should_ignore();
        if self.applied == Some(ignore) {
            return None;
        }
        self.applied = Some(ignore);
        Some(ignore)
    }
}
