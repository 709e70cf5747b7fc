/// HTML element and attribute classification used by the parser and renderers.
use lazy_static::lazy_static;
use std::collections::HashSet;

/// Void elements: cannot have children or a closing tag.
/// https://html.spec.whatwg.org/multipage/syntax.html#void-elements
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

lazy_static! {
    /// DOM event handler attribute names, as written in templates.
    /// Based on preact's JSX typings.
    static ref EVENTS: HashSet<&'static str> = [
        // Image
        "onLoad", "onError",
        // Clipboard
        "onCopy", "onCut", "onPaste",
        // Composition
        "onCompositionEnd", "onCompositionStart", "onCompositionUpdate",
        // Details and dialog
        "onToggle", "onClose", "onCancel",
        // Focus
        "onFocus", "onFocusIn", "onFocusOut", "onBlur",
        // Form
        "onChange", "onInput", "onBeforeInput", "onSearch", "onSubmit", "onInvalid",
        "onReset", "onFormData",
        // Keyboard
        "onKeyDown", "onKeyPress", "onKeyUp",
        // Media
        "onAbort", "onCanPlay", "onCanPlayThrough", "onDurationChange", "onEmptied",
        "onEncrypted", "onEnded", "onLoadedData", "onLoadedMetadata", "onLoadStart",
        "onPause", "onPlay", "onPlaying", "onProgress", "onRateChange", "onSeeked",
        "onSeeking", "onStalled", "onSuspend", "onTimeUpdate", "onVolumeChange",
        "onWaiting", "onEnterPictureInPicture", "onLeavePictureInPicture",
        // Mouse
        "onClick", "onContextMenu", "onDblClick", "onDrag", "onDragEnd", "onDragEnter",
        "onDragExit", "onDragLeave", "onDragOver", "onDragStart", "onDrop",
        "onMouseDown", "onMouseEnter", "onMouseLeave", "onMouseMove", "onMouseOut",
        "onMouseOver", "onMouseUp",
        // Pointer
        "onPointerCancel", "onPointerDown", "onPointerEnter", "onPointerLeave",
        "onPointerMove", "onPointerOut", "onPointerOver", "onPointerUp",
        // Selection, touch, UI, wheel
        "onSelect", "onTouchCancel", "onTouchEnd", "onTouchMove", "onTouchStart",
        "onScroll", "onResize", "onWheel",
        // Animation and transition
        "onAnimationStart", "onAnimationEnd", "onAnimationIteration",
        "onTransitionCancel", "onTransitionEnd", "onTransitionRun", "onTransitionStart",
    ]
    .into_iter()
    .collect();
}

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Whether an attribute name is a DOM event handler such as `onClick`
pub fn is_event_handler(name: &str) -> bool {
    EVENTS.contains(name)
}

/// Tag names starting with an uppercase letter refer to components
pub fn is_component_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
}
