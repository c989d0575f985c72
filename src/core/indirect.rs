//! Indirect string resolution for rule groupings
//!
//! Built-in rule groups are stored as resource references such as
//! `@FirewallAPI.dll,-32752`: a module name and a negated string-table id.
//! Resolution loads the module as a data-only resource container and reads
//! the numbered string. Anything that is not such a reference, and any
//! failure along the way, yields the input unchanged.

use regex::Regex;
use std::sync::LazyLock;

static INDIRECT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@(?P<module>.+\.dll),-(?P<id>\d+)$").expect("indirect token pattern is valid")
});

/// A parsed `@module,-id` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectToken<'a> {
    pub module: &'a str,
    pub resource_id: u32,
}

/// Splits an indirect string reference into module and resource id.
///
/// Returns `None` for any text that is not a reference.
pub fn parse_indirect_token(text: &str) -> Option<IndirectToken<'_>> {
    let caps = INDIRECT_TOKEN.captures(text)?;
    let module = caps.name("module")?.as_str();
    let resource_id = caps.name("id")?.as_str().parse().ok()?;
    Some(IndirectToken {
        module,
        resource_id,
    })
}

/// Expands grouping tokens into display text.
///
/// Implementations never fail: unresolvable input comes back unchanged.
pub trait IndirectStringResolver: Send + Sync {
    fn resolve(&self, token: &str) -> String;
}

/// Returns every token unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl IndirectStringResolver for PassthroughResolver {
    fn resolve(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Resolver for the current platform: resource strings on Windows, passthrough elsewhere.
pub fn platform_resolver() -> Box<dyn IndirectStringResolver> {
    #[cfg(windows)]
    {
        Box::new(windows_impl::ResourceStringResolver)
    }
    #[cfg(not(windows))]
    {
        Box::new(PassthroughResolver)
    }
}

#[cfg(windows)]
pub use windows_impl::ResourceStringResolver;

#[cfg(windows)]
mod windows_impl {
    use super::{IndirectStringResolver, parse_indirect_token};
    use std::path::PathBuf;
    use tracing::debug;
    use windows::Win32::Foundation::{FreeLibrary, HANDLE, HINSTANCE, HMODULE};
    use windows::Win32::System::LibraryLoader::{LOAD_LIBRARY_AS_DATAFILE, LoadLibraryExW};
    use windows::Win32::UI::WindowsAndMessaging::LoadStringW;
    use windows::core::{HSTRING, PWSTR};

    /// Loads `@module,-id` strings from module string tables.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ResourceStringResolver;

    /// Frees the module on every exit path.
    struct LoadedModule(HMODULE);

    impl Drop for LoadedModule {
        fn drop(&mut self) {
            // SAFETY: the handle came from a successful LoadLibraryExW call.
            unsafe {
                let _ = FreeLibrary(self.0);
            }
        }
    }

    const SYSTEM_ROOT_VAR: &str = "%SystemRoot%";

    fn module_path(module: &str) -> PathBuf {
        let root = PathBuf::from(
            std::env::var_os("SystemRoot").unwrap_or_else(|| r"C:\Windows".into()),
        );
        if let Some(prefix) = module.get(..SYSTEM_ROOT_VAR.len())
            && prefix.eq_ignore_ascii_case(SYSTEM_ROOT_VAR)
        {
            let rest = module[SYSTEM_ROOT_VAR.len()..].trim_start_matches(['\\', '/']);
            return root.join(rest);
        }
        if module.contains(['\\', '/']) {
            return PathBuf::from(module);
        }
        root.join("System32").join(module)
    }

    fn load_string(module: &str, id: u32) -> Option<String> {
        let path = HSTRING::from(module_path(module).as_os_str());
        // SAFETY: data-file load maps resources only; no code from the module runs.
        let handle =
            unsafe { LoadLibraryExW(&path, HANDLE::default(), LOAD_LIBRARY_AS_DATAFILE) }.ok()?;
        let module = LoadedModule(handle);

        let mut buffer = [0u16; 1024];
        // SAFETY: buffer outlives the call and its length is passed alongside.
        let len = unsafe {
            LoadStringW(
                HINSTANCE(module.0.0),
                id,
                PWSTR(buffer.as_mut_ptr()),
                buffer.len() as i32,
            )
        };
        let len = usize::try_from(len).ok().filter(|&n| n > 0)?;
        Some(String::from_utf16_lossy(&buffer[..len]))
    }

    impl IndirectStringResolver for ResourceStringResolver {
        fn resolve(&self, token: &str) -> String {
            let Some(parsed) = parse_indirect_token(token) else {
                return token.to_string();
            };
            match load_string(parsed.module, parsed.resource_id) {
                Some(text) => text,
                None => {
                    debug!("Could not resolve indirect string '{token}', keeping token");
                    token.to_string()
                }
            }
        }
    }
}
