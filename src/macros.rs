/// Escribe una línea indentada en la salida de un contexto de emisión.
///
/// Sin argumentos de formato se emite una línea vacía, sin indentación.
macro_rules! emit {
    ($context:expr) => {
        writeln!($context.output).map_err(|error| $context.fault(error))
    };

    ($context:expr, $($format:tt)*) => {{
        let indent = $context.indent * crate::codegen::INDENT;
        match write!($context.output, "{:1$}", "", indent) {
            Ok(()) => writeln!($context.output, $($format)*),
            error => error,
        }
        .map_err(|error| $context.fault(error))
    }};
}
