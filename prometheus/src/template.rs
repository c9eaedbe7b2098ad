use crate::QueryError;

/// Substitutes `target` into the single `%s` placeholder of a query template.
///
/// `%%` renders a literal percent sign. A template without a `%s`, with more than one, or with any other verb is
/// rejected so a typo never silently queries the wrong series.
pub fn render_query(template: &str, target: &str) -> Result<String, QueryError> {
    let malformed = |reason: String| QueryError::MalformedQuery {
        template: template.to_string(),
        reason,
    };

    let mut rendered = String::with_capacity(template.len() + target.len());
    let mut placeholders = 0;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            rendered.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                placeholders += 1;
                rendered.push_str(target);
            }
            Some('%') => rendered.push('%'),
            Some(other) => return Err(malformed(format!("unsupported verb '%{other}'"))),
            None => return Err(malformed("dangling '%' at end of template".to_string())),
        }
    }

    match placeholders {
        1 => Ok(rendered),
        n => Err(malformed(format!("expected exactly one '%s' placeholder, found {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn substitutes_target_once() {
        let query = render_query(r#"sum(increase(x{app="%s"}[1h])) by (app)"#, "memento").unwrap();
        assert_eq!(query, r#"sum(increase(x{app="memento"}[1h])) by (app)"#);
        assert_eq!(query.matches(r#"app="memento""#).count(), 1);
        assert!(!query.contains('%'));
    }

    #[test]
    fn escaped_percent_is_literal() {
        let query = render_query(r#"rate(x{app="%s"}[5m]) * 100 %% 7"#, "a").unwrap();
        assert_eq!(query, r#"rate(x{app="a"}[5m]) * 100 % 7"#);
    }

    #[test]
    fn rejects_wrong_placeholder_arity() {
        for template in ["up", r#"x{a="%s",b="%s"}"#, r#"x{a="%d"}"#, "x %"] {
            let err = render_query(template, "a").unwrap_err();
            assert!(
                matches!(err, QueryError::MalformedQuery { .. }),
                "{template} should be malformed, got {err}"
            );
        }
    }
}
