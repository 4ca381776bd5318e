//! gcov text report parsing
//!
//! Report lines look like `"<count>:<lineno>:<source>"`. `-` marks a
//! non-executable line; `#####`, `=====`, `%%%%%` and `$$$$$` mark lines that
//! never ran. Anything else in the count column is an executed line.

const UNEXECUTED: [&str; 4] = ["#####", "=====", "%%%%%", "$$$$$"];

/// Line numbers a gcov report marks as executed, in report order
pub fn executed_lines(report: &str) -> Vec<u32> {
    report
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, ':');
            let count = fields.next()?.trim();
            let lineno = fields.next()?.trim();
            let count = count.trim_end_matches('*');
            if count.is_empty() || count == "-" || UNEXECUTED.contains(&count) {
                return None;
            }
            lineno.parse::<u32>().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_lines_filters_markers() {
        let report = "\
        -:    0:Source:../../gcc/gcc/predict.c
        -:    1:/* Branch prediction routines */
        5:   10:  int x = 0;
    #####:   11:  abort ();
    =====:   12:  throw;
       12*:  13:  return x;
        -:   14:}
";
        assert_eq!(executed_lines(report), vec![10, 13]);
    }

    #[test]
    fn test_ignores_function_and_branch_summaries() {
        let report = "\
function foo called 3 returned 100% blocks executed 80%
branch  0 taken 2
_Z3foov:
        3:   20:foo ()
";
        assert_eq!(executed_lines(report), vec![20]);
    }

    #[test]
    fn test_empty_report() {
        assert!(executed_lines("").is_empty());
    }
}
