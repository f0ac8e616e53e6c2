//! One-time graphics capability check that gates the render loop.

/// Message shown when no usable graphics backend exists.
#[cfg(target_arch = "wasm32")]
pub const UNSUPPORTED_MESSAGE: &str = "Your browser does not seem to support WebGL 2";
#[cfg(not(target_arch = "wasm32"))]
pub const UNSUPPORTED_MESSAGE: &str = "Your graphics card does not seem to support WebGPU, Vulkan, Metal or DirectX 12";

/// Id of the element the diagnostic is placed in on the web.
pub const MESSAGE_ELEMENT_ID: &str = "webglmessage";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported(String),
}

impl Capability {
    pub fn unsupported() -> Self {
        Capability::Unsupported(UNSUPPORTED_MESSAGE.to_string())
    }
}

/**
 * Runs `start` only when the capability is supported, otherwise hands the diagnostic to
 * `report`. Exactly one of the two closures is called.
 */
pub fn gate<T>(
    capability: Capability,
    start: impl FnOnce() -> T,
    report: impl FnOnce(&str),
) -> Option<T> {
    match capability {
        Capability::Supported => Some(start()),
        Capability::Unsupported(message) => {
            report(&message);
            None
        }
    }
}

/// Checks whether the page can create a WebGL 2 context on a throwaway canvas.
#[cfg(target_arch = "wasm32")]
pub fn probe() -> Capability {
    use wasm_bindgen::JsCast;

    let canvas = web_sys::window()
        .and_then(|win| win.document())
        .and_then(|doc| doc.create_element("canvas").ok())
        .and_then(|el| el.dyn_into::<web_sys::HtmlCanvasElement>().ok());
    match canvas.map(|canvas| canvas.get_context("webgl2")) {
        Some(Ok(Some(_))) => Capability::Supported,
        _ => Capability::unsupported(),
    }
}

/// Native backends are probed while creating the adapter; see [`crate::context::Context::new`].
#[cfg(not(target_arch = "wasm32"))]
pub fn probe() -> Capability {
    Capability::Supported
}

/// Puts the diagnostic into `#<container_id>`, or `<body>` if that element is missing.
#[cfg(target_arch = "wasm32")]
pub fn show_diagnostic(message: &str, container_id: &str) {
    log::error!("{}", message);
    let Some(doc) = web_sys::window().and_then(|win| win.document()) else {
        return;
    };
    let Ok(element) = doc.create_element("div") else {
        return;
    };
    element.set_id(MESSAGE_ELEMENT_ID);
    element.set_text_content(Some(message));
    let appended = match doc.get_element_by_id(container_id) {
        Some(container) => container.append_child(&element).is_ok(),
        None => doc
            .body()
            .map(|body| body.append_child(&element).is_ok())
            .unwrap_or(false),
    };
    if !appended {
        log::warn!("could not insert the compatibility message into the page");
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn show_diagnostic(message: &str, _container_id: &str) {
    log::error!("{}", message);
}
