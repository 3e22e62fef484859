//! JavaScript run inside the page.

/// Stealth evasion patches applied after navigation.
/// Based on puppeteer-extra-plugin-stealth techniques.
pub const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['zh-TW', 'zh', 'en-US', 'en'],
        configurable: true
    });
    "#,
    // Remove automation-related properties
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
];

/// Resolves once the document is interactive.
pub const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Attribute tagging elements handed out as [`crate::driver::ElementRef`]s.
pub const REF_ATTRIBUTE: &str = "data-harvest-ref";

/// Wrapper for every driver script.
///
/// `__ARGS__` becomes a JSON array in which element handles are encoded as
/// `{"__ref": id}`; `__BODY__` is the script, which sees the resolved values
/// as `arguments`. The result is always an envelope: `{value}`, `{stale}`
/// or `{error}`.
pub const EXECUTE_TEMPLATE: &str = r#"
(() => {
    const resolve = (v) => {
        if (v && typeof v === 'object' && typeof v.__ref === 'string') {
            const el = document.querySelector('[data-harvest-ref="' + v.__ref + '"]');
            if (!el) {
                throw { __stale: v.__ref };
            }
            return el;
        }
        return v;
    };
    try {
        const args = __ARGS__.map(resolve);
        const value = (function() { __BODY__ }).apply(null, args);
        return { value: value === undefined ? null : value };
    } catch (e) {
        if (e && e.__stale) {
            return { stale: e.__stale };
        }
        return { error: String(e && e.message ? e.message : e) };
    }
})()
"#;

/// `arguments`: scope element or null, selector kind, expression.
/// Returns ref ids of the matching elements in document order.
pub const FIND: &str = r#"
    const [root, kind, expr] = arguments;
    const scope = root || document;
    const nodes = [];
    if (kind === 'css') {
        nodes.push(...scope.querySelectorAll(expr));
    } else {
        const snap = document.evaluate(expr, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < snap.snapshotLength; i++) {
            const node = snap.snapshotItem(i);
            if (node.nodeType === Node.ELEMENT_NODE) {
                nodes.push(node);
            }
        }
    }
    return nodes.map((el) => {
        let id = el.getAttribute('data-harvest-ref');
        if (!id) {
            window.__harvestSeq = (window.__harvestSeq || 0) + 1;
            id = String(window.__harvestSeq);
            el.setAttribute('data-harvest-ref', id);
        }
        return id;
    });
"#;

pub const ATTRIBUTE: &str = "return arguments[0].getAttribute(arguments[1]);";

pub const TEXT: &str = "return arguments[0].innerText || arguments[0].textContent || '';";

pub const IS_DISPLAYED: &str = r#"
    const el = arguments[0];
    const style = window.getComputedStyle(el);
    const boxed = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    return boxed && style.visibility !== 'hidden' && style.display !== 'none' && !el.disabled;
"#;

pub const SCROLL_ELEMENT_BY: &str = "arguments[0].scrollTop += arguments[1]; return null;";

pub const SCROLL_WINDOW_BY: &str = "window.scrollBy(0, arguments[0]); return null;";

pub const ELEMENT_OFFSET: &str = "return Math.round(arguments[0].scrollTop);";

pub const WINDOW_OFFSET: &str =
    "return Math.round(window.pageYOffset || document.documentElement.scrollTop || 0);";

pub const EXTENT: &str = "return [arguments[0].scrollHeight, arguments[0].clientHeight];";

pub const CLICK: &str = r#"
    const el = arguments[0];
    if (el.disabled) {
        throw new Error('element is disabled');
    }
    el.scrollIntoView({ block: 'center' });
    el.click();
    return null;
"#;

pub const FOCUS: &str = "arguments[0].focus(); return null;";

/// Build the script actually sent to the page.
pub fn wrap(body: &str, args_json: &str) -> String {
    EXECUTE_TEMPLATE
        .replacen("__ARGS__", args_json, 1)
        .replacen("__BODY__", body, 1)
}
