use dry_templates_core::{
    Compiler, FileSystemResolver, Language, Options, TemplateError, compose,
};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use std::path::Path;
use syn::{LitStr, Token, parse::Parse, parse::ParseStream, parse_macro_input};
use walkdir::WalkDir;

/// Extensions picked up by `dry_templates_directory!`
const EXTENSIONS: [&str; 4] = ["html", "xml", "md", "txt"];

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            for lc in c.to_lowercase() {
                result.push(lc);
            }
        } else if c == '-' || c == '.' || c == ' ' {
            result.push('_');
        } else {
            result.push(c);
        }
    }
    result
}

fn language_for(path: &Path) -> Language {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("xml") => Language::Xml,
        Some("md") => Language::Markdown,
        _ => Language::Html,
    }
}

fn manifest_dir() -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string())
}

/// A template composed and checked at build time
struct Checked {
    source: String,
    dependencies: Vec<String>,
}

/// Resolves and compiles a template the same way it will be at runtime, so any
/// error surfaces while building
fn check(
    source: &str,
    origin: Option<&str>,
    resolver: &FileSystemResolver,
    options: Options,
) -> Result<Checked, TemplateError> {
    let composition = compose(source, origin, resolver)?;
    Compiler::new(options).compile(&composition.source)?;
    let dependencies = composition
        .dependencies
        .iter()
        .map(|path| resolver.resolve(path).to_string_lossy().to_string())
        .collect();
    Ok(Checked {
        source: composition.source,
        dependencies,
    })
}

fn language_tokens(language: Language) -> proc_macro2::TokenStream {
    match language {
        Language::Html => quote! { ::dry_templates::Language::Html },
        Language::Xml => quote! { ::dry_templates::Language::Xml },
        Language::Markdown => quote! { ::dry_templates::Language::Markdown },
    }
}

fn generate_code(name: &str, checked: &Checked, options: Options) -> proc_macro2::TokenStream {
    let function_name = format_ident!("{}", to_snake_case(name));
    let source = &checked.source;
    let dependencies = &checked.dependencies;
    let language = language_tokens(options.language);
    let trim_blocks = options.trim_blocks;
    let lstrip_blocks = options.lstrip_blocks;

    quote! {
        pub fn #function_name() -> &'static ::dry_templates::Template {
            // ensure the compiler is aware the output is linked to the template files so
            // that any change to them will trigger a recompilation
            #(const _: &[u8] = include_bytes!(#dependencies);)*

            static TEMPLATE: ::std::sync::OnceLock<::dry_templates::Template> =
                ::std::sync::OnceLock::new();
            TEMPLATE.get_or_init(|| {
                let options = ::dry_templates::Options {
                    language: #language,
                    trim_blocks: #trim_blocks,
                    lstrip_blocks: #lstrip_blocks,
                };
                ::dry_templates::Template::with_resolver(
                    #source,
                    &::dry_templates::NullResolver,
                    options,
                )
                .expect("template was checked when the crate was built")
            })
        }
    }
}

fn generate_code_for_file(
    relative: &str,
    resolver: &FileSystemResolver,
    span: Span,
) -> Result<proc_macro2::TokenStream, syn::Error> {
    let path = resolver.resolve(relative);
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let source = std::fs::read_to_string(&path)
        .map_err(|e| syn::Error::new(span, format!("Failed to read {:?}: {}", path, e)))?;
    let options = Options::with_language(language_for(&path));
    let checked = check(&source, Some(relative), resolver, options)
        .map_err(|e| syn::Error::new(span, format!("{}: {}", relative, e)))?;
    Ok(generate_code(&name, &checked, options))
}

struct StrInput {
    name: LitStr,
    content: LitStr,
    language: Option<LitStr>,
}

impl Parse for StrInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let content: LitStr = input.parse()?;
        let language = if input.parse::<Option<Token![,]>>()?.is_some() && !input.is_empty() {
            Some(input.parse()?)
        } else {
            None
        };
        Ok(StrInput {
            name,
            content,
            language,
        })
    }
}

#[proc_macro]
pub fn dry_templates_directory(input: TokenStream) -> TokenStream {
    let dir_lit = parse_macro_input!(input as LitStr);
    let dir_str = dir_lit.value();

    let manifest_dir = manifest_dir();
    let root_path = Path::new(&manifest_dir).join(&dir_str);

    if !root_path.is_dir() {
        return syn::Error::new(
            dir_lit.span(),
            format!("Directory not found: {:?}", root_path),
        )
        .to_compile_error()
        .into();
    }

    let resolver = FileSystemResolver::with_root(&manifest_dir);
    let mut functions = Vec::new();

    for entry in WalkDir::new(&root_path).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let path = entry.path();
        let wanted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext));
        if !path.is_file() || !wanted {
            continue;
        }
        let Ok(relative) = path.strip_prefix(&manifest_dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        match generate_code_for_file(&relative, &resolver, dir_lit.span()) {
            Ok(function) => functions.push(function),
            Err(error) => return error.to_compile_error().into(),
        }
    }

    let expanded = quote! {
        #(#functions)*
    };

    TokenStream::from(expanded)
}

#[proc_macro]
pub fn dry_templates_file(input: TokenStream) -> TokenStream {
    let file_lit = parse_macro_input!(input as LitStr);
    let file_str = file_lit.value();

    let manifest_dir = manifest_dir();
    let resolver = FileSystemResolver::with_root(&manifest_dir);

    if !resolver.resolve(&file_str).is_file() {
        return syn::Error::new(
            file_lit.span(),
            format!("File not found: {:?}", resolver.resolve(&file_str)),
        )
        .to_compile_error()
        .into();
    }

    match generate_code_for_file(&file_str, &resolver, file_lit.span()) {
        Ok(function) => TokenStream::from(function),
        Err(error) => error.to_compile_error().into(),
    }
}

#[proc_macro]
pub fn dry_templates_str(input: TokenStream) -> TokenStream {
    let StrInput {
        name,
        content,
        language,
    } = parse_macro_input!(input as StrInput);

    let language = match language {
        Some(lit) => match lit.value().parse::<Language>() {
            Ok(language) => language,
            Err(reason) => return syn::Error::new(lit.span(), reason).to_compile_error().into(),
        },
        None => Language::default(),
    };
    let options = Options::with_language(language);
    let resolver = FileSystemResolver::with_root(manifest_dir());

    match check(&content.value(), None, &resolver, options) {
        Ok(checked) => TokenStream::from(generate_code(&name.value(), &checked, options)),
        Err(error) => syn::Error::new(content.span(), error.to_string())
            .to_compile_error()
            .into(),
    }
}
