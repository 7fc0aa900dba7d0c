//! JavaScript renderings of a [`RemoteDescriptor`].
//!
//! Both bundler flavors come from the same fragments: the version lookup
//! chain resolves the entry URL, and the promise flavor appends script
//! injection and container wrapping. Every descriptor field is embedded as
//! a JSON string literal.

use crate::descriptor::RemoteDescriptor;
use crate::url::{remote_entry_prefix, REMOTE_ENTRY_FILE};

/// Evaluates to a promise of the remote entry URL.
const RESOLVE_ENTRY_URL: &str = r#"fetch(__CONFIG_API_URL__)
  .then((res) => {
    if (!res.ok) {
      throw new Error('Failed to fetch version config: HTTP ' + res.status);
    }
    return res.json();
  })
  .then((data) => {
    const component = __COMPONENT__;
    const environment = __ENVIRONMENT__;
    const table = data && data.success ? data.value : undefined;
    const tiers = table && typeof table[component] === 'object' ? table[component] : undefined;
    const pick = (key) => (tiers && typeof tiers[key] === 'string' ? tiers[key] : '');
    const version = pick(environment) || pick(__ENVIRONMENT_LONG__);
    if (!version) {
      throw new Error('Version not found in config for ' + component + '.' + environment);
    }
    return __ENTRY_PREFIX__ + version + '/' + __ENTRY_FILE__;
  })"#;

/// Continues [`RESOLVE_ENTRY_URL`] with script injection and adaptation.
const LOAD_CONTAINER: &str = r#"
  .then((scriptUrl) => new Promise((resolve, reject) => {
    const component = __COMPONENT__;
    const script = document.createElement('script');
    script.src = scriptUrl;
    script.async = true;
    script.onload = () => {
      if (typeof window[component] === 'undefined') {
        reject(new Error('Remote container ' + component + ' not found after script load'));
        return;
      }
      resolve({
        get: (request) => {
          const container = window[component];
          if (!container || typeof container.get !== 'function') {
            throw new Error('Remote container ' + component + '.get is not available');
          }
          return container.get(request);
        },
        init: (shareScope) => {
          try {
            const container = window[component];
            if (!container || typeof container.init !== 'function') {
              throw new Error('Remote container ' + component + '.init is not available');
            }
            const pending = shareScope && typeof shareScope === 'object'
              ? container.init(shareScope)
              : container.init();
            return Promise.resolve(pending).catch((e) => {
              console.warn('Remote container already initialized:', e);
            });
          } catch (e) {
            console.warn('Remote container already initialized:', e);
          }
        },
      });
    };
    script.onerror = () => {
      reject(new Error('Failed to load remoteEntry.js: ' + scriptUrl));
    };
    document.head.appendChild(script);
  }))"#;

const PLACEHOLDERS: [&str; 6] = [
    "__CONFIG_API_URL__",
    "__COMPONENT__",
    "__ENVIRONMENT_LONG__",
    "__ENVIRONMENT__",
    "__ENTRY_PREFIX__",
    "__ENTRY_FILE__",
];

fn js_string(value: &str) -> String {
    // A JSON string is also a valid JavaScript string literal.
    serde_json::Value::String(value.to_string()).to_string()
}

fn bindings(descriptor: &RemoteDescriptor) -> [String; 6] {
    [
        js_string(&descriptor.config_api_url),
        js_string(&descriptor.component_name),
        js_string(descriptor.environment.long_key()),
        js_string(descriptor.environment.key()),
        js_string(&remote_entry_prefix(
            &descriptor.rdc_base_url,
            &descriptor.component_name,
        )),
        js_string(REMOTE_ENTRY_FILE),
    ]
}

/// Single left-to-right pass, so substituted text is never rescanned.
fn render(template: &str, values: &[String; 6]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    loop {
        let next = PLACEHOLDERS
            .iter()
            .enumerate()
            .filter_map(|(i, p)| rest.find(p).map(|at| (at, i)))
            .min();

        match next {
            Some((at, i)) => {
                out.push_str(&rest[..at]);
                out.push_str(&values[i]);
                rest = &rest[at + PLACEHOLDERS[i].len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

pub fn external_entry(descriptor: &RemoteDescriptor) -> String {
    render(RESOLVE_ENTRY_URL, &bindings(descriptor))
}

pub fn promise_remote(descriptor: &RemoteDescriptor) -> String {
    let values = bindings(descriptor);
    format!(
        "promise {}{}",
        render(RESOLVE_ENTRY_URL, &values),
        render(LOAD_CONTAINER, &values)
    )
}
