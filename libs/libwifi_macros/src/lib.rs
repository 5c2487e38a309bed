use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod inner;

/// Implements `libwifi::Addresses` for a frame struct by delegating to its
/// `header` field, which must be a `ManagementHeader`.
///
/// ```rust,ignore
/// #[derive(Clone, Debug, AddressHeader)]
/// pub struct Disassociation {
///     pub header: ManagementHeader,
///     pub reason_code: DeauthenticationReason,
/// }
/// ```
///
/// expands to
///
/// ```rust,ignore
/// impl crate::Addresses for Disassociation {
///     fn src(&self) -> Option<&crate::frame::components::MacAddress> {
///         self.header.src()
///     }
///     // dest() and bssid() likewise
/// }
/// ```
#[proc_macro_derive(AddressHeader)]
pub fn address_header(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    inner::address_header_inner(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
