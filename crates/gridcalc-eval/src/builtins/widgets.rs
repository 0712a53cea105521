//! Functions whose cells are drawn or clicked rather than just read. The
//! hooks only report what should happen; painting belongs to the host.

use gridcalc_common::Value;

use super::logical::truthy;
use super::utils::{arg, scalars};
use crate::function::{ArgSpec, CallContext, Function, HookContext, HookResult};
use crate::function_registry::FunctionLibrary;

/* ─────────────────────────── HYPERLINK() ────────────────────── */

#[derive(Debug)]
pub struct HyperlinkFn;

/// Shows `text`; a click navigates to `reference`.
impl Function for HyperlinkFn {
    fn name(&self) -> &'static str {
        "HYPERLINK"
    }
    crate::fn_arguments!(ArgSpec::new("text"), ArgSpec::new("URL or reference"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Text(arg(args, 0).to_text())
    }
    fn click(&self, ctx: &HookContext) -> Option<HookResult> {
        let target = arg(&ctx.args, 1).to_text();
        Some(HookResult {
            handled: !target.is_empty(),
            target: Some(target).filter(|t| !t.is_empty()),
            ..HookResult::default()
        })
    }
}

/* ─────────────────────────── CHECKBOX() ─────────────────────── */

#[derive(Debug)]
pub struct CheckboxFn;

/// A boolean toggled by clicking. The click result carries the new state
/// for the host to write back into the formula.
impl Function for CheckboxFn {
    fn name(&self) -> &'static str {
        "CHECKBOX"
    }
    crate::fn_arguments!(ArgSpec::new("checked"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Boolean(truthy(arg(args, 0)))
    }
    fn render(&self, ctx: &HookContext) -> Option<HookResult> {
        Some(HookResult {
            handled: true,
            value: Some(Value::Boolean(truthy(&ctx.value))),
            ..HookResult::default()
        })
    }
    fn click(&self, ctx: &HookContext) -> Option<HookResult> {
        Some(HookResult {
            handled: true,
            value: Some(Value::Boolean(!truthy(&ctx.value))),
            ..HookResult::default()
        })
    }
}

/* ─────────────────────────── SPARKLINE.* ────────────────────── */

/// Numbers of the data argument, in column order, for the host to plot.
fn sparkline(ctx: &HookContext) -> Option<HookResult> {
    let data = scalars(&ctx.args[..ctx.args.len().min(1)])
        .filter(|v| matches!(v, Value::Number(_)))
        .cloned()
        .collect();
    Some(HookResult {
        handled: true,
        value: Some(Value::column(data)),
        ..HookResult::default()
    })
}

#[derive(Debug)]
pub struct SparklineColumnFn;

impl Function for SparklineColumnFn {
    fn name(&self) -> &'static str {
        "SPARKLINE.COLUMN"
    }
    crate::fn_arguments!(
        ArgSpec::new("data"),
        ArgSpec::new("color"),
        ArgSpec::new("negative color"),
    );
    fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
        Value::Undefined
    }
    fn render(&self, ctx: &HookContext) -> Option<HookResult> {
        sparkline(ctx)
    }
}

#[derive(Debug)]
pub struct SparklineLineFn;

impl Function for SparklineLineFn {
    fn name(&self) -> &'static str {
        "SPARKLINE.LINE"
    }
    crate::fn_arguments!(
        ArgSpec::new("data"),
        ArgSpec::new("color"),
        ArgSpec::new("line width"),
    );
    fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
        Value::Undefined
    }
    fn render(&self, ctx: &HookContext) -> Option<HookResult> {
        sparkline(ctx)
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library;
        HyperlinkFn, CheckboxFn, SparklineColumnFn, SparklineLineFn,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::CellAddress;

    fn hook(value: Value, args: Vec<Value>) -> HookContext {
        HookContext {
            address: CellAddress::new(0, 0),
            value,
            args,
        }
    }

    #[test]
    fn hyperlink_click_targets_reference() {
        let result = HyperlinkFn
            .click(&hook("docs".into(), vec!["docs".into(), "https://example.com".into()]))
            .unwrap();
        assert!(result.handled);
        assert_eq!(result.target.as_deref(), Some("https://example.com"));
        assert!(HyperlinkFn.render(&hook(Value::Undefined, vec![])).is_none());
    }

    #[test]
    fn checkbox_toggles() {
        let result = CheckboxFn.click(&hook(true.into(), vec![true.into()])).unwrap();
        assert_eq!(result.value, Some(Value::Boolean(false)));
        let result = CheckboxFn.render(&hook(false.into(), vec![false.into()])).unwrap();
        assert_eq!(result.value, Some(Value::Boolean(false)));
    }

    #[test]
    fn sparkline_render_reports_numbers() {
        let data = Value::column(vec![1.into(), "x".into(), 3.into()]);
        let result = SparklineLineFn
            .render(&hook(Value::Undefined, vec![data, "red".into()]))
            .unwrap();
        assert_eq!(result.value, Some(Value::column(vec![1.into(), 3.into()])));
        assert!(SparklineColumnFn.click(&hook(Value::Undefined, vec![])).is_none());
    }
}
