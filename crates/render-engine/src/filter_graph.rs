//! Typed ffmpeg filter graphs.
//!
//! Graphs are assembled from typed nodes and only turned into the textual
//! `-filter_complex` form at the invocation boundary. All literal text that
//! ends up inside a node (overlay text, font paths) goes through
//! [`escape_text`], so escaping lives in one place.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Escape a literal for use inside a single-quoted filter option value.
///
/// Order matters: backslashes first, then colons, then quotes. Doing colons
/// or quotes first would double-escape the backslashes they introduce.
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "'\\''")
}

/// A link label, written `[name]` in the graph text.
///
/// Input stream pads (`0:v`, `1:v`) refer to renderer inputs; all other pads
/// are produced by a chain in the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pad(String);

impl Pad {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Video stream of the `index`-th renderer input.
    pub fn input_video(index: usize) -> Self {
        Self(format!("{index}:v"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Stream index if this pad names a renderer input.
    pub fn input_index(&self) -> Option<usize> {
        let (index, kind) = self.0.split_once(':')?;
        if kind != "v" && kind != "a" {
            return None;
        }
        index.parse().ok()
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// How `Scale` treats the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFit {
    /// Scale to the given size exactly. A negative dimension keeps aspect
    /// (`-2` rounds to an even value for yuv420p encoders).
    Exact,
    /// Grow until both dimensions cover the target, keeping aspect.
    Cover,
}

/// Horizontal position of a text overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextX {
    Center,
    Left(u32),
}

/// Parameters of one `drawtext` overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawText {
    pub font_file: PathBuf,
    pub text: String,
    pub font_size: u32,
    pub color: String,
    pub x: TextX,
    pub y: u32,
    pub border_width: u32,
    pub border_color: String,
    pub shadow_offset: u32,
}

/// Alpha masks applied through `geq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMask {
    /// Opaque where the distance to the frame centre is at most half the
    /// shorter side, fully transparent elsewhere.
    Circle,
}

/// One filter in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    Split {
        outputs: usize,
    },
    Scale {
        width: i32,
        height: i32,
        fit: ScaleFit,
    },
    Crop {
        width: u32,
        height: u32,
    },
    Blur {
        radius: u32,
        power: u32,
    },
    /// Second input drawn over the first; positions are renderer expressions.
    Overlay {
        x: String,
        y: String,
    },
    DrawText(DrawText),
    /// Filled rectangle.
    DrawBox {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: String,
    },
    Format {
        pixel_format: String,
    },
    AlphaMask(AlphaMask),
}

impl FilterNode {
    /// How many pads the node consumes and produces.
    fn arity(&self) -> (usize, usize) {
        match self {
            FilterNode::Split { outputs } => (1, *outputs),
            FilterNode::Overlay { .. } => (2, 1),
            _ => (1, 1),
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Split { outputs } => write!(f, "split={outputs}"),
            FilterNode::Scale {
                width,
                height,
                fit: ScaleFit::Exact,
            } => write!(f, "scale={width}:{height}"),
            FilterNode::Scale {
                width,
                height,
                fit: ScaleFit::Cover,
            } => write!(
                f,
                "scale={width}:{height}:force_original_aspect_ratio=increase"
            ),
            FilterNode::Crop { width, height } => write!(f, "crop={width}:{height}"),
            FilterNode::Blur { radius, power } => write!(f, "boxblur={radius}:{power}"),
            FilterNode::Overlay { x, y } => write!(f, "overlay={x}:{y}"),
            FilterNode::DrawText(text) => {
                let x = match text.x {
                    TextX::Center => "(w-text_w)/2".to_string(),
                    TextX::Left(x) => x.to_string(),
                };
                write!(
                    f,
                    "drawtext=fontfile='{font}':text='{body}':expansion=none:fontcolor={color}:fontsize={size}:x={x}:y={y}:borderw={bw}:bordercolor={bc}",
                    font = escape_text(&text.font_file.to_string_lossy()),
                    body = escape_text(&text.text),
                    color = text.color,
                    size = text.font_size,
                    y = text.y,
                    bw = text.border_width,
                    bc = text.border_color,
                )?;
                if text.shadow_offset > 0 {
                    write!(
                        f,
                        ":shadowx={s}:shadowy={s}",
                        s = text.shadow_offset
                    )?;
                }
                Ok(())
            }
            FilterNode::DrawBox {
                x,
                y,
                width,
                height,
                color,
            } => write!(
                f,
                "drawbox=x={x}:y={y}:w={width}:h={height}:color={color}:t=fill"
            ),
            FilterNode::Format { pixel_format } => write!(f, "format={pixel_format}"),
            FilterNode::AlphaMask(AlphaMask::Circle) => f.write_str(
                "geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='if(lte(hypot(X-W/2,Y-H/2),min(W,H)/2),255,0)'",
            ),
        }
    }
}

/// Filters applied in sequence between labelled inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub nodes: Vec<FilterNode>,
    pub outputs: Vec<Pad>,
}

impl FilterChain {
    pub fn new(inputs: Vec<Pad>, nodes: Vec<FilterNode>, outputs: Vec<Pad>) -> Self {
        Self {
            inputs,
            nodes,
            outputs,
        }
    }

    fn check_arity(&self) -> Result<(), GraphError> {
        let (first, last) = match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(GraphError::EmptyChain),
        };
        if first.arity().0 != self.inputs.len() || last.arity().1 != self.outputs.len() {
            return Err(GraphError::Arity {
                chain: self.to_string(),
            });
        }
        // Inner links are implicit, so every node after the first must be 1:1 on input.
        let inner_ok = self
            .nodes
            .windows(2)
            .all(|pair| pair[0].arity().1 == 1 && pair[1].arity().0 == 1);
        if !inner_ok {
            return Err(GraphError::Arity {
                chain: self.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{pad}")?;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{node}")?;
        }
        for pad in &self.outputs {
            write!(f, "{pad}")?;
        }
        Ok(())
    }
}

/// Structural problems in a filter graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("filter chain has no filters")]
    EmptyChain,

    #[error("pad count does not match filter arity in {chain:?}")]
    Arity { chain: String },

    #[error("pad [{0}] is produced more than once")]
    DuplicatePad(String),

    #[error("pad [{0}] is consumed before it is produced")]
    UndefinedPad(String),

    #[error("pad [{0}] is consumed more than once")]
    PadReused(String),

    #[error("graph has no final output")]
    NoOutput,

    #[error("graph has several unconsumed outputs: {0:?}")]
    MultipleOutputs(Vec<String>),
}

/// An ordered list of chains resolving to exactly one output pad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chain, checking its pads against what is already in the graph.
    pub fn push(&mut self, chain: FilterChain) -> Result<&mut Self, GraphError> {
        chain.check_arity()?;

        let produced = self.produced_pads();
        let consumed = self.consumed_pads();
        for pad in &chain.inputs {
            if consumed.contains(pad) {
                return Err(GraphError::PadReused(pad.name().to_string()));
            }
            if pad.input_index().is_none() && !produced.contains(pad) {
                return Err(GraphError::UndefinedPad(pad.name().to_string()));
            }
        }

        let mut fresh = HashSet::new();
        for pad in &chain.outputs {
            if pad.input_index().is_some() || produced.contains(pad) || !fresh.insert(pad) {
                return Err(GraphError::DuplicatePad(pad.name().to_string()));
            }
        }

        self.chains.push(chain);
        Ok(self)
    }

    /// The single produced pad nothing consumes.
    pub fn output_pad(&self) -> Result<&Pad, GraphError> {
        let consumed = self.consumed_pads();
        let dangling: Vec<&Pad> = self
            .chains
            .iter()
            .flat_map(|chain| chain.outputs.iter())
            .filter(|pad| !consumed.contains(*pad))
            .collect();

        match dangling.as_slice() {
            [] => Err(GraphError::NoOutput),
            [only] => Ok(*only),
            many => Err(GraphError::MultipleOutputs(
                many.iter().map(|p| p.name().to_string()).collect(),
            )),
        }
    }

    /// Renderer inputs referenced by the graph, ascending.
    pub fn input_streams(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .chains
            .iter()
            .flat_map(|chain| chain.inputs.iter())
            .filter_map(Pad::input_index)
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Number of `drawtext` nodes, mostly useful for diagnostics.
    pub fn text_overlay_count(&self) -> usize {
        self.chains
            .iter()
            .flat_map(|chain| chain.nodes.iter())
            .filter(|node| matches!(node, FilterNode::DrawText(_)))
            .count()
    }

    /// Textual `-filter_complex` form. Fails unless the graph has one output.
    pub fn render(&self) -> Result<String, GraphError> {
        self.output_pad()?;
        Ok(self.to_string())
    }

    fn produced_pads(&self) -> HashSet<&Pad> {
        self.chains
            .iter()
            .flat_map(|chain| chain.outputs.iter())
            .collect()
    }

    fn consumed_pads(&self) -> HashSet<&Pad> {
        self.chains
            .iter()
            .flat_map(|chain| chain.inputs.iter())
            .collect()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_node(text: &str) -> FilterNode {
        FilterNode::DrawText(DrawText {
            font_file: PathBuf::from("/fonts/a.ttc"),
            text: text.to_string(),
            font_size: 55,
            color: "yellow".to_string(),
            x: TextX::Center,
            y: 1400,
            border_width: 3,
            border_color: "black".to_string(),
            shadow_offset: 3,
        })
    }

    /// Split a single-quoted option value the way the renderer does: a quote
    /// toggles quoting, a backslash outside quotes escapes the next char.
    /// Returns the unescaped value and whatever follows it.
    ///
    /// Models one level of unescaping only. The renderer unescapes again when
    /// the filter parses its options; this checks the single level
    /// `escape_text` guarantees.
    fn read_quoted_value(s: &str) -> (String, &str) {
        let mut out = String::new();
        let mut quoted = false;
        let mut chars = s.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '\'' => quoted = !quoted,
                '\\' if !quoted => {
                    if let Some((_, next)) = chars.next() {
                        out.push(next);
                    }
                }
                ':' if !quoted => return (out, &s[i..]),
                _ => out.push(c),
            }
        }
        (out, "")
    }

    #[test]
    fn test_escape_order_backslash_colon_quote() {
        assert_eq!(escape_text(r"a:b\c'd"), r"a\:b\\c'\''d");
        assert_eq!(escape_text(r"\:"), r"\\\:");
        assert_eq!(escape_text("plain 文字"), "plain 文字");
    }

    #[test]
    fn test_escaped_text_field_does_not_terminate_early() {
        let node = text_node(r"a:b\c'd");
        let rendered = node.to_string();
        let start = rendered.find("text=").unwrap() + "text=".len();
        let (_, rest) = read_quoted_value(&rendered[start..]);
        // The next option after the text field must be `expansion`, proving
        // the field swallowed every `:`, `\` and `'` from the literal.
        assert!(rest.starts_with(":expansion=none"), "rest was {rest:?}");
    }

    #[test]
    fn test_quote_survives_tokenizing() {
        let rendered = text_node("it's").to_string();
        let start = rendered.find("text=").unwrap() + "text=".len();
        let (value, _) = read_quoted_value(&rendered[start..]);
        assert_eq!(value, "it's");
    }

    #[test]
    fn test_drawtext_layout_options() {
        let mut node = text_node("hi");
        assert!(node.to_string().contains(":x=(w-text_w)/2:y=1400:"));
        if let FilterNode::DrawText(t) = &mut node {
            t.x = TextX::Left(250);
            t.shadow_offset = 0;
        }
        let rendered = node.to_string();
        assert!(rendered.contains(":x=250:y=1400:"));
        assert!(!rendered.contains("shadowx"));
    }

    #[test]
    fn test_node_rendering() {
        assert_eq!(FilterNode::Split { outputs: 2 }.to_string(), "split=2");
        assert_eq!(
            FilterNode::Scale {
                width: 1080,
                height: 1920,
                fit: ScaleFit::Cover
            }
            .to_string(),
            "scale=1080:1920:force_original_aspect_ratio=increase"
        );
        assert_eq!(
            FilterNode::Scale {
                width: 1080,
                height: -2,
                fit: ScaleFit::Exact
            }
            .to_string(),
            "scale=1080:-2"
        );
        assert_eq!(
            FilterNode::Blur {
                radius: 20,
                power: 10
            }
            .to_string(),
            "boxblur=20:10"
        );
        assert_eq!(
            FilterNode::DrawBox {
                x: 40,
                y: 1370,
                width: 1000,
                height: 200,
                color: "black@0.5".to_string()
            }
            .to_string(),
            "drawbox=x=40:y=1370:w=1000:h=200:color=black@0.5:t=fill"
        );
        let mask = FilterNode::AlphaMask(AlphaMask::Circle).to_string();
        assert!(mask.contains("a='if(lte(hypot(X-W/2,Y-H/2),min(W,H)/2),255,0)'"));
    }

    #[test]
    fn test_graph_resolves_single_output() {
        let mut graph = FilterGraph::new();
        graph
            .push(FilterChain::new(
                vec![Pad::input_video(0)],
                vec![FilterNode::Split { outputs: 2 }],
                vec![Pad::named("a"), Pad::named("b")],
            ))
            .unwrap()
            .push(FilterChain::new(
                vec![Pad::named("a"), Pad::named("b")],
                vec![FilterNode::Overlay {
                    x: "0".to_string(),
                    y: "0".to_string(),
                }],
                vec![Pad::named("out")],
            ))
            .unwrap();

        assert_eq!(graph.output_pad().unwrap(), &Pad::named("out"));
        assert_eq!(graph.input_streams(), vec![0]);
        assert_eq!(
            graph.render().unwrap(),
            "[0:v]split=2[a][b];[a][b]overlay=0:0[out]"
        );
    }

    #[test]
    fn test_graph_rejects_duplicate_pads() {
        let mut graph = FilterGraph::new();
        graph
            .push(FilterChain::new(
                vec![Pad::input_video(0)],
                vec![FilterNode::Format {
                    pixel_format: "rgba".to_string(),
                }],
                vec![Pad::named("x")],
            ))
            .unwrap();
        let err = graph
            .push(FilterChain::new(
                vec![Pad::input_video(1)],
                vec![FilterNode::Format {
                    pixel_format: "rgba".to_string(),
                }],
                vec![Pad::named("x")],
            ))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicatePad("x".to_string()));
    }

    #[test]
    fn test_graph_rejects_undefined_and_reused_pads() {
        let mut graph = FilterGraph::new();
        let err = graph
            .push(FilterChain::new(
                vec![Pad::named("ghost")],
                vec![FilterNode::Blur {
                    radius: 1,
                    power: 1,
                }],
                vec![Pad::named("y")],
            ))
            .unwrap_err();
        assert_eq!(err, GraphError::UndefinedPad("ghost".to_string()));

        graph
            .push(FilterChain::new(
                vec![Pad::input_video(0)],
                vec![FilterNode::Split { outputs: 1 }],
                vec![Pad::named("s")],
            ))
            .unwrap()
            .push(FilterChain::new(
                vec![Pad::named("s")],
                vec![FilterNode::Blur {
                    radius: 1,
                    power: 1,
                }],
                vec![Pad::named("t")],
            ))
            .unwrap();
        let err = graph
            .push(FilterChain::new(
                vec![Pad::named("s")],
                vec![FilterNode::Blur {
                    radius: 1,
                    power: 1,
                }],
                vec![Pad::named("u")],
            ))
            .unwrap_err();
        assert_eq!(err, GraphError::PadReused("s".to_string()));
    }

    #[test]
    fn test_graph_with_two_dangling_outputs_does_not_render() {
        let mut graph = FilterGraph::new();
        graph
            .push(FilterChain::new(
                vec![Pad::input_video(0)],
                vec![FilterNode::Split { outputs: 2 }],
                vec![Pad::named("a"), Pad::named("b")],
            ))
            .unwrap();
        assert!(matches!(
            graph.render(),
            Err(GraphError::MultipleOutputs(_))
        ));
        assert_eq!(FilterGraph::new().render(), Err(GraphError::NoOutput));
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let mut graph = FilterGraph::new();
        let err = graph
            .push(FilterChain::new(
                vec![Pad::input_video(0)],
                vec![FilterNode::Overlay {
                    x: "0".to_string(),
                    y: "0".to_string(),
                }],
                vec![Pad::named("o")],
            ))
            .unwrap_err();
        assert!(matches!(err, GraphError::Arity { .. }));
        assert_eq!(
            graph
                .push(FilterChain::new(vec![], vec![], vec![]))
                .unwrap_err(),
            GraphError::EmptyChain
        );
    }
}
