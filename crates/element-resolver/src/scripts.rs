//! In-page JavaScript builders used by the resolver. Selector strings are
//! always embedded as JSON literals so arbitrary quoting cannot break out of
//! the expression.

use cdp_driver::QueryScope;

fn literal(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "null".to_string())
}

pub fn css_first(scope: &QueryScope, selector: &str) -> String {
    format!(
        "(() => {{ const scope = {}; return scope ? scope.querySelector({}) : null; }})()",
        scope.expression(),
        literal(selector)
    )
}

pub fn css_all(scope: &QueryScope, selector: &str) -> String {
    format!(
        "(() => {{ const scope = {}; return scope ? Array.from(scope.querySelectorAll({})) : []; }})()",
        scope.expression(),
        literal(selector)
    )
}

pub fn xpath_first(scope: &QueryScope, selector: &str) -> String {
    format!(
        "(() => {{\n    const scope = {scope};\n    if (!scope) {{ return null; }}\n    const doc = scope.ownerDocument || scope;\n    const result = doc.evaluate({path}, scope, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null);\n    return result.singleNodeValue;\n}})()",
        scope = scope.expression(),
        path = literal(selector)
    )
}

/// Ordered-snapshot match count; cheap relative to transferring the nodes.
pub fn xpath_count(scope: &QueryScope, selector: &str) -> String {
    format!(
        "(() => {{\n    const scope = {scope};\n    if (!scope) {{ return 0; }}\n    const doc = scope.ownerDocument || scope;\n    const result = doc.evaluate({path}, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\n    return result.snapshotLength;\n}})()",
        scope = scope.expression(),
        path = literal(selector)
    )
}

/// Full ordered snapshot collected into an array, kept page-side as a
/// remote object so nodes can be converted one at a time.
pub fn xpath_snapshot(scope: &QueryScope, selector: &str) -> String {
    format!(
        "(() => {{\n    const scope = {scope};\n    if (!scope) {{ return []; }}\n    const doc = scope.ownerDocument || scope;\n    const result = doc.evaluate({path}, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\n    const nodes = [];\n    for (let i = 0; i < result.snapshotLength; i++) {{\n        nodes.push(result.snapshotItem(i));\n    }}\n    return nodes;\n}})()",
        scope = scope.expression(),
        path = literal(selector)
    )
}
