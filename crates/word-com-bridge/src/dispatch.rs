//! Safe wrapper around IDispatch for late-bound COM automation.
//!
//! Word is driven entirely through IDispatch (like VBScript late binding):
//! members are looked up by name at call time and every value crosses the
//! boundary as a VARIANT.

#![cfg(windows)]

use std::mem::ManuallyDrop;
use std::ptr;

use windows::{
    core::{BSTR, GUID, HSTRING, PCWSTR},
    Win32::{
        Foundation::{DISP_E_EXCEPTION, VARIANT_BOOL},
        Globalization::GetSystemDefaultLCID,
        System::{
            Com::{
                CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_LOCAL_SERVER, DISPATCH_FLAGS,
                DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
                EXCEPINFO,
            },
            Ole::DISPID_PROPERTYPUT,
            Variant::{
                VariantClear, VARENUM, VARIANT, VT_BOOL, VT_BSTR, VT_DISPATCH, VT_EMPTY, VT_I2,
                VT_I4, VT_NULL, VT_R4, VT_R8,
            },
        },
    },
};

/// Build a tagged VARIANT. Fields sit behind `ManuallyDrop`, so they are
/// written in place with `ptr::write`.
macro_rules! tagged {
    ($vt:expr, $field:ident, $val:expr) => {{
        let mut raw = VARIANT::default();
        unsafe {
            let inner = &mut *raw.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, $vt);
            ptr::write(&mut inner.Anonymous.$field, $val);
        }
        Variant(raw)
    }};
}

/// An owned VARIANT. Dropping it runs `VariantClear`, which frees a BSTR
/// payload and releases a dispatch payload.
pub struct Variant(VARIANT);

impl Variant {
    pub fn empty() -> Self {
        Self(VARIANT::default())
    }

    pub fn bool(val: bool) -> Self {
        tagged!(VT_BOOL, boolVal, VARIANT_BOOL(if val { -1 } else { 0 }))
    }

    pub fn int(val: i32) -> Self {
        tagged!(VT_I4, lVal, val)
    }

    pub fn double(val: f64) -> Self {
        tagged!(VT_R8, dblVal, val)
    }

    pub fn text(val: &str) -> Self {
        tagged!(VT_BSTR, bstrVal, ManuallyDrop::new(BSTR::from(val)))
    }

    /// Holds its own reference to `disp`, released when the variant drops.
    pub fn dispatch(disp: &IDispatch) -> Self {
        tagged!(VT_DISPATCH, pdispVal, ManuallyDrop::new(Some(disp.clone())))
    }

    pub fn vt(&self) -> VARENUM {
        unsafe { self.0.Anonymous.Anonymous.vt }
    }

    pub fn is_empty(&self) -> bool {
        let vt = self.vt();
        vt == VT_EMPTY || vt == VT_NULL
    }

    pub fn as_bool(&self) -> Option<bool> {
        let data = unsafe { &self.0.Anonymous.Anonymous.Anonymous };
        (self.vt() == VT_BOOL).then(|| unsafe { data.boolVal.0 != 0 })
    }

    pub fn as_i32(&self) -> Option<i32> {
        let data = unsafe { &self.0.Anonymous.Anonymous.Anonymous };
        match self.vt() {
            vt if vt == VT_I4 => Some(unsafe { data.lVal }),
            vt if vt == VT_I2 => Some(i32::from(unsafe { data.iVal })),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        let data = unsafe { &self.0.Anonymous.Anonymous.Anonymous };
        match self.vt() {
            vt if vt == VT_R8 => Some(unsafe { data.dblVal }),
            vt if vt == VT_R4 => Some(f64::from(unsafe { data.fltVal })),
            _ => None,
        }
    }

    pub fn to_text(&self) -> Option<String> {
        if self.vt() != VT_BSTR {
            return None;
        }
        let bstr: &BSTR = unsafe { &self.0.Anonymous.Anonymous.Anonymous.bstrVal };
        Some(bstr.to_string())
    }

    /// A new reference to the dispatch payload. The variant keeps its own
    /// reference until it is dropped. A null pointer yields `None`.
    pub fn to_dispatch(&self) -> Option<IDispatch> {
        if self.vt() != VT_DISPATCH {
            return None;
        }
        let disp: &Option<IDispatch> = unsafe { &self.0.Anonymous.Anonymous.Anonymous.pdispVal };
        disp.clone()
    }

    /// Free the payload and reset to `VT_EMPTY`.
    pub fn clear(&mut self) {
        if let Err(e) = unsafe { VariantClear(&mut self.0) } {
            eprintln!("[word-com-bridge] VariantClear failed: {e}");
        }
    }

    /// Bitwise view for DISPPARAMS. Ownership stays with `self`.
    fn borrow_raw(&self) -> VARIANT {
        unsafe { ptr::read(&self.0) }
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        self.clear();
    }
}

// -- DispatchObject --

/// A wrapper around an IDispatch COM object providing ergonomic access.
#[derive(Clone)]
pub struct DispatchObject {
    inner: IDispatch,
}

impl DispatchObject {
    /// Create a COM object from a ProgID string (e.g., "Word.Application").
    pub fn create_from_progid(progid: &str) -> Result<Self, String> {
        unsafe {
            let hstr = HSTRING::from(progid);
            let clsid =
                CLSIDFromProgID(&hstr).map_err(|e| format!("CLSIDFromProgID failed: {e}"))?;
            let disp: IDispatch = CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| format!("CoCreateInstance failed for '{progid}': {e}"))?;
            Ok(Self { inner: disp })
        }
    }

    pub fn from_idispatch(disp: IDispatch) -> Self {
        Self { inner: disp }
    }

    pub fn as_idispatch(&self) -> &IDispatch {
        &self.inner
    }

    /// Look up the DISPID for a member name.
    fn get_dispid(&self, name: &str) -> Result<i32, String> {
        unsafe {
            let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            let pcwstr = PCWSTR(wide.as_ptr());
            let names = [pcwstr];
            let mut dispid = 0i32;
            self.inner
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    names.as_ptr(),
                    1,
                    GetSystemDefaultLCID(),
                    &mut dispid,
                )
                .map_err(|e| format!("GetIDsOfNames('{name}') failed: {e}"))?;
            Ok(dispid)
        }
    }

    /// Call `name` with positional arguments given in natural order.
    /// `args` stay owned by the caller and are cleared when it drops them.
    fn call(&self, name: &str, flags: DISPATCH_FLAGS, args: &[Variant]) -> Result<Variant, String> {
        let dispid = self.get_dispid(name)?;
        unsafe {
            // DISPPARAMS requires arguments in reverse order
            let mut reversed: Vec<VARIANT> = args.iter().rev().map(Variant::borrow_raw).collect();
            let params = DISPPARAMS {
                rgvarg: if reversed.is_empty() {
                    std::ptr::null_mut()
                } else {
                    reversed.as_mut_ptr()
                },
                rgdispidNamedArgs: std::ptr::null_mut(),
                cArgs: reversed.len() as u32,
                cNamedArgs: 0,
            };
            let mut result = Variant::empty();
            let mut except = EXCEPINFO::default();
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    GetSystemDefaultLCID(),
                    flags,
                    &params,
                    Some(&mut result.0),
                    Some(&mut except),
                    None,
                )
                .map_err(|e| format_invoke_error(e, &except, name))?;
            Ok(result)
        }
    }

    /// Get a property value, indexed by `args` when given
    /// (`obj.Item("name")`, `obj.Cell(2, 3)`).
    pub fn get_property(&self, name: &str, args: &[Variant]) -> Result<Variant, String> {
        // Parameterized properties such as Table.Cell are methods to some
        // servers, so both flags are passed as VBScript does.
        let flags = if args.is_empty() {
            DISPATCH_PROPERTYGET
        } else {
            DISPATCH_PROPERTYGET | DISPATCH_METHOD
        };
        self.call(name, flags, args)
    }

    /// Set a property value. Equivalent to VB's `obj.PropertyName = value`.
    pub fn set_property(&self, name: &str, value: Variant) -> Result<(), String> {
        let dispid = self.get_dispid(name)?;
        unsafe {
            let mut args = [value.borrow_raw()];
            let mut named_args = [DISPID_PROPERTYPUT];
            let params = DISPPARAMS {
                rgvarg: args.as_mut_ptr(),
                rgdispidNamedArgs: named_args.as_mut_ptr(),
                cArgs: 1,
                cNamedArgs: 1,
            };
            let mut except = EXCEPINFO::default();
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    GetSystemDefaultLCID(),
                    DISPATCH_PROPERTYPUT,
                    &params,
                    None,
                    Some(&mut except),
                    None,
                )
                .map_err(|e| format_invoke_error(e, &except, name))?;
            Ok(())
        }
    }

    /// Invoke a method. Arguments are in natural order.
    pub fn invoke_method(&self, name: &str, args: &[Variant]) -> Result<Variant, String> {
        self.call(name, DISPATCH_METHOD, args)
    }
}

/// Format an Invoke error, including EXCEPINFO details if available.
fn format_invoke_error(err: windows::core::Error, except: &EXCEPINFO, member_name: &str) -> String {
    let code = err.code().0 as u32;
    if code == DISP_E_EXCEPTION.0 as u32 {
        let desc = if !except.bstrDescription.is_empty() {
            except.bstrDescription.to_string()
        } else {
            String::from("(no description)")
        };
        let source = if !except.bstrSource.is_empty() {
            except.bstrSource.to_string()
        } else {
            String::from("(no source)")
        };
        format!("COM exception in '{member_name}': {desc} (source: {source})")
    } else {
        format!("Invoke('{member_name}') failed: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_variants_read_back() {
        assert_eq!(Variant::bool(true).as_bool(), Some(true));
        assert_eq!(Variant::int(-7).as_i32(), Some(-7));
        assert_eq!(Variant::double(2.5).as_f64(), Some(2.5));
        assert_eq!(Variant::text("Rows").to_text().as_deref(), Some("Rows"));
        assert_eq!(Variant::int(3).as_bool(), None);
        assert!(Variant::empty().is_empty());
        assert!(Variant::empty().to_dispatch().is_none());
    }

    #[test]
    fn test_clear_frees_payload_and_resets_tag() {
        let mut v = Variant::text("bookmark text");
        assert!(v.vt() == VT_BSTR);
        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.to_text(), None);
        // Dropping after an explicit clear must not free the BSTR again.
        drop(v);
    }
}
