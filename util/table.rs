/**
A `Table` renders a header and rows of cells as a plain text table with columns padded to a common width.

```
use snowcast_util::table::Table;

let table = Table::new(
	vec!["".to_owned(), "Pred: No Snow".to_owned()],
	vec![vec!["True: No Snow".to_owned(), "12".to_owned()]],
);
let rendered = table.to_string();
assert!(rendered.starts_with("|               | Pred: No Snow |"));
```
*/
pub struct Table {
	padding: usize,
	header: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl Table {
	pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Table {
		Table {
			padding: 1,
			header,
			rows,
		}
	}

	fn column_widths(&self) -> Vec<usize> {
		let mut column_widths: Vec<usize> = self.header.iter().map(|value| value.len()).collect();
		for row in self.rows.iter() {
			for (column_width, value) in column_widths.iter_mut().zip(row.iter()) {
				*column_width = usize::max(*column_width, value.len());
			}
		}
		column_widths
	}
}

impl std::fmt::Display for Table {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let column_widths = self.column_widths();
		let line = Line {
			column_widths: &column_widths,
			padding: self.padding,
		};
		let header = Row {
			column_widths: &column_widths,
			padding: self.padding,
			values: &self.header,
		};
		writeln!(f, "{}", header)?;
		writeln!(f, "{}", line)?;
		for values in self.rows.iter() {
			let row = Row {
				column_widths: &column_widths,
				padding: self.padding,
				values,
			};
			writeln!(f, "{}", row)?;
		}
		Ok(())
	}
}

struct Line<'a> {
	column_widths: &'a [usize],
	padding: usize,
}

impl<'a> std::fmt::Display for Line<'a> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "|")?;
		for column_width in self.column_widths.iter() {
			write!(f, "{}|", "-".repeat(column_width + 2 * self.padding))?;
		}
		Ok(())
	}
}

struct Row<'a> {
	column_widths: &'a [usize],
	padding: usize,
	values: &'a [String],
}

impl<'a> std::fmt::Display for Row<'a> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "|")?;
		for (column_width, value) in self.column_widths.iter().zip(self.values) {
			let padding = " ".repeat(self.padding);
			write!(
				f,
				"{}{}{}|",
				padding,
				value,
				" ".repeat(column_width + self.padding - value.len())
			)?;
		}
		Ok(())
	}
}

#[test]
fn test_table() {
	let table = Table::new(
		vec!["class".to_owned(), "f1".to_owned()],
		vec![
			vec!["No Snow".to_owned(), "0.98".to_owned()],
			vec!["Heavy Snow".to_owned(), "1.00".to_owned()],
		],
	);
	let expected = "\
| class      | f1   |
|------------|------|
| No Snow    | 0.98 |
| Heavy Snow | 1.00 |
";
	assert_eq!(table.to_string(), expected);
}
