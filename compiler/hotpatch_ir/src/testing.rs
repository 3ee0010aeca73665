//! Test fixtures: outline builders that render a small brace language
//! through `TreeBuilder`.
//!
//! Trivia follows the usual front-end convention: indentation and comment
//! lines are leading trivia of the next node, the end-of-line newline is
//! trailing trivia of the node that ends the line.
//!
//! ```text
//! class Player
//! {
//!     void Update()
//!     {
//!         x = 1;
//!     }
//! }
//! ```

use crate::{AccessorKind, BoxError, BuildError, NodeKind, SourceTree, SymbolSet, TreeBuilder};

const INDENT: &str = "    ";

#[derive(Clone, Debug)]
pub struct AttrFixture {
    name: String,
    args: Option<String>,
}

impl AttrFixture {
    pub fn new(name: impl Into<String>) -> Self {
        AttrFixture {
            name: name.into(),
            args: None,
        }
    }

    /// Attribute with an argument list, e.g. `SourceLocation("A.cs", 3)`.
    pub fn with_args(name: impl Into<String>, args: impl Into<String>) -> Self {
        AttrFixture {
            name: name.into(),
            args: Some(args.into()),
        }
    }
}

#[derive(Clone, Debug)]
enum BodyItem {
    Statement(String),
    Comment(String),
    Declaration(MethodFixture),
}

fn body_items<I, S>(items: I) -> Vec<BodyItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(|s| {
            let s = s.into();
            if s.trim_start().starts_with("//") {
                BodyItem::Comment(s)
            } else {
                BodyItem::Statement(s)
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
enum MethodBody {
    Block(Vec<BodyItem>),
    Arrow(String),
}

#[derive(Clone, Debug)]
pub struct MethodFixture {
    name: String,
    returns: String,
    params: String,
    attributes: Vec<AttrFixture>,
    body: MethodBody,
}

/// Block-bodied `void` method with the given statements.
pub fn method<I, S>(name: &str, body: I) -> MethodFixture
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    MethodFixture::new(name).body(body)
}

impl MethodFixture {
    pub fn new(name: impl Into<String>) -> Self {
        MethodFixture {
            name: name.into(),
            returns: "void".to_string(),
            params: String::new(),
            attributes: Vec::new(),
            body: MethodBody::Block(Vec::new()),
        }
    }

    #[must_use]
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = ty.into();
        self
    }

    #[must_use]
    pub fn params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }

    #[must_use]
    pub fn attribute(mut self, attr: AttrFixture) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Statements; entries starting with `//` become comment lines.
    #[must_use]
    pub fn body<I, S>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body = MethodBody::Block(body_items(body));
        self
    }

    /// `=> expr;` body.
    #[must_use]
    pub fn arrow(mut self, expr: impl Into<String>) -> Self {
        self.body = MethodBody::Arrow(expr.into());
        self
    }

    /// Append a method declaration inside the block body.
    #[must_use]
    pub fn declare_in_body(mut self, nested: MethodFixture) -> Self {
        if let MethodBody::Block(items) = &mut self.body {
            items.push(BodyItem::Declaration(nested));
        }
        self
    }
}

#[derive(Clone, Debug)]
pub struct PropertyFixture {
    name: String,
    ty: String,
    getter: Option<Vec<BodyItem>>,
    setter: Option<Vec<BodyItem>>,
    arrow: Option<String>,
}

impl PropertyFixture {
    pub fn new(name: impl Into<String>) -> Self {
        PropertyFixture {
            name: name.into(),
            ty: "int".to_string(),
            getter: None,
            setter: None,
            arrow: None,
        }
    }

    #[must_use]
    pub fn getter<I, S>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.getter = Some(body_items(body));
        self
    }

    #[must_use]
    pub fn setter<I, S>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setter = Some(body_items(body));
        self
    }

    /// Expression-bodied property, `int X => expr;`.
    #[must_use]
    pub fn arrow(mut self, expr: impl Into<String>) -> Self {
        self.arrow = Some(expr.into());
        self
    }
}

#[derive(Clone, Debug)]
enum Member {
    Method(MethodFixture),
    Property(PropertyFixture),
    Field { name: String, text: String },
    Class(ClassFixture),
    Comment(String),
}

#[derive(Clone, Debug)]
pub struct ClassFixture {
    name: String,
    attributes: Vec<AttrFixture>,
    members: Vec<Member>,
}

impl ClassFixture {
    pub fn new(name: impl Into<String>) -> Self {
        ClassFixture {
            name: name.into(),
            attributes: Vec::new(),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, attr: AttrFixture) -> Self {
        self.attributes.push(attr);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodFixture) -> Self {
        self.members.push(Member::Method(method));
        self
    }

    #[must_use]
    pub fn property(mut self, property: PropertyFixture) -> Self {
        self.members.push(Member::Property(property));
        self
    }

    /// Field declaration; `text` is the full line without indentation.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    #[must_use]
    pub fn class(mut self, nested: ClassFixture) -> Self {
        self.members.push(Member::Class(nested));
        self
    }

    /// Comment line, attached as leading trivia of the next member.
    #[must_use]
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.members.push(Member::Comment(text.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct FileFixture {
    path: String,
    symbols: Vec<String>,
    header: Option<String>,
    namespace: Option<String>,
    classes: Vec<ClassFixture>,
}

impl FileFixture {
    pub fn new(path: impl Into<String>) -> Self {
        FileFixture {
            path: path.into(),
            symbols: Vec::new(),
            header: None,
            namespace: None,
            classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Comment written before everything else.
    #[must_use]
    pub fn header(mut self, comment: impl Into<String>) -> Self {
        self.header = Some(comment.into());
        self
    }

    #[must_use]
    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        self.namespace = Some(name.into());
        self
    }

    #[must_use]
    pub fn class(mut self, class: ClassFixture) -> Self {
        self.classes.push(class);
        self
    }

    pub fn build(&self) -> Result<SourceTree, BuildError> {
        let mut b = TreeBuilder::new(self.path.clone());
        b.symbols(self.symbols.iter().cloned());
        b.start(NodeKind::CompilationUnit);
        let mut leading = String::new();
        if let Some(header) = &self.header {
            leading.push_str(header);
            leading.push('\n');
        }

        match &self.namespace {
            Some(ns) => {
                b.start_named(NodeKind::Namespace, ns.clone());
                b.trivia(&leading);
                b.token(&format!("namespace {ns}")).trivia("\n");
                b.token("{").trivia("\n");
                for class in &self.classes {
                    emit_class(&mut b, class, 1, "");
                }
                b.token("}").trivia("\n");
                b.finish_node();
            }
            None => {
                let mut first = true;
                for class in &self.classes {
                    emit_class(&mut b, class, 0, if first { leading.as_str() } else { "" });
                    first = false;
                }
                if first {
                    b.trivia(&leading);
                }
            }
        }

        b.finish_node();
        b.finish()
    }
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn emit_attributes(b: &mut TreeBuilder, attrs: &[AttrFixture], depth: usize) {
    for attr in attrs {
        b.start(NodeKind::AttributeList);
        b.trivia(&indent(depth));
        b.token("[");
        b.start_named(NodeKind::Attribute, attr.name.clone());
        b.token(&attr.name);
        if let Some(args) = &attr.args {
            b.start(NodeKind::AttributeArguments);
            b.token(&format!("({args})"));
            b.finish_node();
        }
        b.finish_node();
        b.token("]").trivia("\n");
        b.finish_node();
    }
}

fn emit_class(b: &mut TreeBuilder, class: &ClassFixture, depth: usize, leading: &str) {
    b.start_named(NodeKind::TypeDecl, class.name.clone());
    b.trivia(leading);
    emit_attributes(b, &class.attributes, depth);
    b.trivia(&indent(depth));
    b.token(&format!("class {}", class.name)).trivia("\n");
    b.trivia(&indent(depth)).token("{").trivia("\n");

    let mut pending = String::new();
    for member in &class.members {
        if let Member::Comment(text) = member {
            pending.push_str(&indent(depth + 1));
            pending.push_str(text);
            pending.push('\n');
            continue;
        }
        let leading = std::mem::take(&mut pending);
        match member {
            Member::Method(m) => emit_method(b, m, depth + 1, &leading),
            Member::Property(p) => emit_property(b, p, depth + 1, &leading),
            Member::Field { name, text } => {
                b.start_named(NodeKind::Field, name.clone());
                b.trivia(&leading).trivia(&indent(depth + 1));
                b.token(text).trivia("\n");
                b.finish_node();
            }
            Member::Class(nested) => emit_class(b, nested, depth + 1, &leading),
            Member::Comment(_) => {}
        }
    }
    b.trivia(&pending);
    b.trivia(&indent(depth)).token("}").trivia("\n");
    b.finish_node();
}

fn emit_method(b: &mut TreeBuilder, m: &MethodFixture, depth: usize, leading: &str) {
    b.start_named(NodeKind::Method, m.name.clone());
    b.trivia(leading);
    emit_attributes(b, &m.attributes, depth);
    b.trivia(&indent(depth));
    b.token(&format!("{} {}", m.returns, m.name));
    b.start(NodeKind::ParameterList);
    b.token(&format!("({})", m.params));
    b.finish_node();
    match &m.body {
        MethodBody::Block(items) => {
            b.trivia("\n");
            emit_block(b, items, depth);
        }
        MethodBody::Arrow(expr) => {
            b.trivia(" ");
            b.start(NodeKind::ArrowClause);
            b.token("=> ");
            b.start(NodeKind::Expression).token(expr).finish_node();
            b.finish_node();
            b.token(";").trivia("\n");
        }
    }
    b.finish_node();
}

fn emit_block(b: &mut TreeBuilder, items: &[BodyItem], depth: usize) {
    b.start(NodeKind::Block);
    b.trivia(&indent(depth)).token("{").trivia("\n");
    let mut pending = String::new();
    for item in items {
        match item {
            BodyItem::Comment(text) => {
                pending.push_str(&indent(depth + 1));
                pending.push_str(text);
                pending.push('\n');
            }
            BodyItem::Statement(text) => {
                b.start(NodeKind::Statement);
                b.trivia(&std::mem::take(&mut pending));
                b.trivia(&indent(depth + 1)).token(text).trivia("\n");
                b.finish_node();
            }
            BodyItem::Declaration(nested) => {
                let leading = std::mem::take(&mut pending);
                emit_method(b, nested, depth + 1, &leading);
            }
        }
    }
    b.trivia(&pending);
    b.trivia(&indent(depth)).token("}").trivia("\n");
    b.finish_node();
}

fn emit_property(b: &mut TreeBuilder, p: &PropertyFixture, depth: usize, leading: &str) {
    b.start_named(NodeKind::Property, p.name.clone());
    b.trivia(leading).trivia(&indent(depth));
    b.token(&format!("{} {}", p.ty, p.name));
    if let Some(expr) = &p.arrow {
        b.trivia(" ");
        b.start(NodeKind::ArrowClause);
        b.token("=> ");
        b.start(NodeKind::Expression).token(expr).finish_node();
        b.finish_node();
        b.token(";").trivia("\n");
        b.finish_node();
        return;
    }
    b.trivia("\n");
    b.trivia(&indent(depth)).token("{").trivia("\n");
    for (kind, keyword, body) in [
        (AccessorKind::Get, "get", &p.getter),
        (AccessorKind::Set, "set", &p.setter),
    ] {
        let Some(items) = body else { continue };
        b.start(NodeKind::Accessor(kind));
        b.trivia(&indent(depth + 1)).token(keyword).trivia("\n");
        emit_block(b, items, depth + 1);
        b.finish_node();
    }
    b.trivia(&indent(depth)).token("}").trivia("\n");
    b.finish_node();
}

/// Parser that wraps any text in a single compilation unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextParser;

impl crate::SourceParser for PlainTextParser {
    fn parse(&self, path: &str, text: &str, symbols: &SymbolSet) -> Result<SourceTree, BoxError> {
        let mut b = TreeBuilder::new(path);
        b.symbols(symbols.iter().cloned());
        b.start(NodeKind::CompilationUnit);
        b.start(NodeKind::Other).token(text).finish_node();
        b.finish_node();
        Ok(b.finish()?)
    }
}
