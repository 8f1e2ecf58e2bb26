//! Logging and debugging facilities.
//!
//! This module provides:
//! - Integration with the `tracing` crate for structured logging
//! - Debug visualization for controller trees
//!
//! # Tracing Integration
//!
//! All instrumentation goes through the `tracing` crate. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! # Debug Visualization
//!
//! Use [`ControllerTreeDebug`] to inspect the controller hierarchy of a
//! runtime:
//!
//! ```ignore
//! use horizon_loom::logging::ControllerTreeDebug;
//!
//! let debug = ControllerTreeDebug::new(&loom);
//! println!("{debug}");
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::controller::Controller;
use crate::error::Result;
use crate::runtime::Loom;

/// Names of the spans emitted by binding operations.
///
/// Use these to match spans in `tracing` filter directives.
pub mod span_names {
    /// Span around a full or filtered model-to-view copy.
    pub const COPY_TO_VIEW: &str = "copy_to_view";
    /// Span around a full or filtered view-to-model copy.
    pub const COPY_TO_MODEL: &str = "copy_to_model";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Framework-wide target.
    pub const LOOM: &str = "horizon_loom";
    /// Controller lifecycle, wiring, and user-edit flow.
    pub const CONTROLLER: &str = "horizon_loom::controller";
    /// Model/view bulk synchronization.
    pub const SYNC: &str = "horizon_loom::sync";
    /// Change tracking and snapshots.
    pub const CHANGES: &str = "horizon_loom::changes";
    /// Validation aggregation.
    pub const VALIDATION: &str = "horizon_loom::validation";
    /// Dirty flags and view refresh.
    pub const REFRESH: &str = "horizon_loom::refresh";
    /// Application event bus.
    pub const BUS: &str = "horizon_loom::bus";
    /// Property path resolution.
    pub const PATH: &str = "horizon_loom::path";
    /// Dynamic handler dispatch.
    pub const DISPATCH: &str = "horizon_loom::dispatch";
}

/// Style options for controller tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    Unicode,
    /// Compact single-line representation.
    Compact,
}

impl Default for TreeStyle {
    fn default() -> Self {
        Self::Unicode
    }
}

/// Configuration for controller tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show controller ids.
    pub show_ids: bool,
    /// Whether to show model/view wiring markers.
    pub show_wiring: bool,
    /// Whether to show dirty/changed state markers.
    pub show_flags: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_wiring: true,
            show_flags: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_wiring: false,
            show_flags: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing the controller trees of a runtime.
#[derive(Clone)]
pub struct ControllerTreeDebug {
    loom: Loom,
    options: TreeFormatOptions,
}

impl ControllerTreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new(loom: &Loom) -> Self {
        Self {
            loom: loom.clone(),
            options: TreeFormatOptions::default(),
        }
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(loom: &Loom, options: TreeFormatOptions) -> Self {
        Self {
            loom: loom.clone(),
            options,
        }
    }

    /// Format every controller tree, starting from the roots.
    pub fn format_all(&self) -> Result<String> {
        let mut output = String::new();
        writeln!(
            output,
            "Controller Tree for '{}' ({} total controllers):",
            self.loom.config().name,
            self.loom.controller_count()
        )
        .expect("write to String");

        let roots = self.loom.root_controllers();
        if roots.is_empty() {
            writeln!(output, "  (empty)").expect("write to String");
        } else {
            for root in roots {
                self.format_subtree_into(&root, 0, true, &mut output)?;
            }
        }
        Ok(output)
    }

    /// Format the subtree below one controller.
    pub fn format_subtree(&self, root: &Controller) -> Result<String> {
        let mut output = String::new();
        self.format_subtree_into(root, 0, true, &mut output)?;
        Ok(output)
    }

    fn format_subtree_into(
        &self,
        controller: &Controller,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) -> Result<()> {
        if let Some(max) = self.options.max_depth
            && depth > max
        {
            return Ok(());
        }

        output.push_str(&self.build_prefix(depth, is_last));

        let name = controller.name();
        output.push_str(if name.is_empty() { "(unnamed)" } else { &name });

        if self.options.show_ids {
            write!(output, " [{:?}]", controller.id()).expect("write to String");
        }

        if self.options.show_wiring {
            let wiring = match (
                controller.model()?.is_some(),
                controller.view()?.is_some(),
            ) {
                (true, true) => " (model+view)",
                (true, false) => " (model)",
                (false, true) => " (view)",
                (false, false) => "",
            };
            output.push_str(wiring);
        }

        if self.options.show_flags {
            if controller.is_view_dirty()? {
                output.push_str(" *dirty");
            }
            if controller.has_view_changes()? {
                output.push_str(" *changed");
            }
        }
        output.push('\n');

        let children = controller.children()?;
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.format_subtree_into(&child, depth + 1, i == count - 1, output)?;
        }
        Ok(())
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            for _ in 0..self.options.indent_size {
                prefix.push(' ');
            }
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix
    }
}

impl fmt::Display for ControllerTreeDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format_all() {
            Ok(output) => write!(f, "{}", output),
            Err(e) => write!(f, "Error formatting controller tree: {}", e),
        }
    }
}
