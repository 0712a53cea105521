use gridcalc_common::{Value, format_number};

use crate::expression::{ExpressionUnit, UnitKind};
use crate::parser::Parser;
use crate::types::{DecimalMark, RenderOptions};

impl Parser {
    /// Renders an expression back to formula text (without the leading
    /// `=`). Parsing the output yields a structurally equal tree.
    pub fn render(&self, unit: &ExpressionUnit, options: &RenderOptions) -> String {
        let separator = options
            .convert_argument_separator
            .unwrap_or(self.config.argument_separator)
            .as_char();
        let ctx = RenderContext {
            options,
            separator: format!("{separator} "),
            source_decimal: self.config.decimal_mark,
            imaginary_char: options
                .convert_imaginary_char
                .unwrap_or(self.config.imaginary_char),
        };
        let mut out = String::new();
        ctx.render(unit, &mut out);
        out
    }
}

struct RenderContext<'a> {
    options: &'a RenderOptions,
    separator: String,
    source_decimal: DecimalMark,
    imaginary_char: char,
}

impl RenderContext<'_> {
    fn target_decimal(&self) -> DecimalMark {
        self.options.convert_decimal.unwrap_or(self.source_decimal)
    }

    fn number(&self, n: f64) -> String {
        let s = format_number(n);
        match self.target_decimal() {
            DecimalMark::Period => s,
            DecimalMark::Comma => s.replace('.', ","),
        }
    }

    fn render_list(&self, items: &[ExpressionUnit], out: &mut String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(&self.separator);
            }
            self.render(item, out);
        }
    }

    fn render(&self, unit: &ExpressionUnit, out: &mut String) {
        let offset = self.options.offset;
        match &unit.kind {
            UnitKind::Address(a) => {
                out.push_str(&a.address.label_with_offset(offset.rows, offset.columns))
            }
            UnitKind::Range(r) => {
                out.push_str(&r.start.address.label_with_offset(offset.rows, offset.columns));
                out.push(':');
                out.push_str(&r.end.address.label_with_offset(offset.rows, offset.columns));
            }
            UnitKind::Missing => out.push_str(&self.options.missing),
            UnitKind::Array { values } => {
                // stored column-major, written row-major
                let rows = values.first().map_or(0, Vec::len);
                out.push('{');
                for r in 0..rows {
                    if r > 0 {
                        out.push_str("; ");
                    }
                    for (c, column) in values.iter().enumerate() {
                        if c > 0 {
                            out.push_str(", ");
                        }
                        self.scalar(&column[r], out);
                    }
                }
                out.push('}');
            }
            UnitKind::Binary {
                operator,
                left,
                right,
            } => {
                self.render(left, out);
                out.push(' ');
                out.push_str(operator);
                out.push(' ');
                self.render(right, out);
            }
            UnitKind::Unary { operator, operand } => {
                out.push_str(operator);
                self.render(operand, out);
            }
            UnitKind::Complex {
                real, imaginary, ..
            } => {
                out.push_str(&self.number(*real));
                if *imaginary >= 0.0 {
                    out.push('+');
                }
                out.push_str(&self.number(*imaginary));
                out.push(self.imaginary_char);
            }
            UnitKind::Imaginary { value, .. } => {
                out.push_str(&self.number(*value));
                out.push(self.imaginary_char);
            }
            UnitKind::Literal { value, text } => match (value, text) {
                (Value::Number(_), Some(text)) => {
                    let from = self.source_decimal.as_char();
                    let to = self.target_decimal().as_char();
                    if from == to {
                        out.push_str(text);
                    } else {
                        out.push_str(&text.replace(from, &to.to_string()));
                    }
                }
                (v, _) => self.scalar(v, out),
            },
            UnitKind::Identifier { name } => out.push_str(name),
            UnitKind::Operator { symbol } => {
                out.push('[');
                out.push_str(symbol);
                out.push(']');
            }
            UnitKind::Group { elements, explicit } => {
                if *explicit {
                    out.push('(');
                    self.render_list(elements, out);
                    out.push(')');
                } else {
                    self.render_list(elements, out);
                }
            }
            UnitKind::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                self.render_list(args, out);
                out.push(')');
            }
        }
    }

    fn scalar(&self, value: &Value, out: &mut String) {
        match value {
            Value::Text(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Value::Number(n) => out.push_str(&self.number(*n)),
            Value::Boolean(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Undefined => {}
            other => out.push_str(&other.to_string()),
        }
    }
}
