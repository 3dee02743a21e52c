/// Adds a test-only `with_base_url` to a type wrapping a `GeminiHttpClient` in `http`.
#[cfg(test)]
macro_rules! impl_with_gemini_base_url {
    ($ty:ty) => {
        impl $ty {
            pub(crate) fn with_base_url(mut self, base_url: String) -> Self {
                self.http = self.http.with_base_url(base_url);
                self
            }
        }
    };
}

#[cfg(test)]
pub(crate) use impl_with_gemini_base_url;

pub mod chat;
pub mod client;
pub mod svg;
pub mod types;

pub use chat::GeminiChatSession;
pub use svg::GeminiSvgGenerator;
